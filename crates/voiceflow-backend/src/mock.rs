use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use voiceflow_core::PipelineError;

use crate::BackendInvoker;

/// Pre-programmed responses for deterministic testing without backend calls.
pub enum MockResponse {
    /// Return these bytes.
    Payload(Bytes),
    /// Fail the invocation.
    Error(PipelineError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn text(s: &str) -> Self {
        Self::Payload(Bytes::from(s.to_owned()))
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock invoker that plays back scripted responses in order, then falls back
/// to a fixed payload if one is configured.
pub struct MockInvoker {
    script: Mutex<VecDeque<MockResponse>>,
    fallback: Option<Bytes>,
    calls: AtomicUsize,
}

impl MockInvoker {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// An invoker that answers every call with the same payload.
    pub fn always(payload: Bytes) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(payload),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    async fn resolve(&self, response: MockResponse) -> Result<Bytes, PipelineError> {
        match response {
            MockResponse::Payload(bytes) => Ok(bytes),
            MockResponse::Error(e) => Err(e),
            MockResponse::Delay(delay, inner) => {
                tokio::time::sleep(delay).await;
                Box::pin(self.resolve(*inner)).await
            }
        }
    }
}

#[async_trait]
impl BackendInvoker for MockInvoker {
    async fn invoke(&self, _model: &str, _payload: Bytes) -> Result<Bytes, PipelineError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let next = self.script.lock().pop_front();
        match next {
            Some(response) => self.resolve(response).await,
            None => match &self.fallback {
                Some(bytes) => Ok(bytes.clone()),
                None => Err(PipelineError::Inference("no scripted response left".into())),
            },
        }
    }
}
