use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use voiceflow_core::PipelineError;

use crate::BackendInvoker;

/// HTTP invoker for the STT/TTS backend workers. One route per model name;
/// payload in and result out are raw octet streams.
pub struct HttpInvoker {
    client: reqwest::Client,
    routes: HashMap<String, String>,
}

impl HttpInvoker {
    pub fn new(request_timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PipelineError::Inference(format!("http client: {e}")))?;
        Ok(Self {
            client,
            routes: HashMap::new(),
        })
    }

    pub fn with_route(mut self, model: impl Into<String>, url: impl Into<String>) -> Self {
        self.routes.insert(model.into(), url.into());
        self
    }
}

#[async_trait]
impl BackendInvoker for HttpInvoker {
    async fn invoke(&self, model: &str, payload: Bytes) -> Result<Bytes, PipelineError> {
        let url = self
            .routes
            .get(model)
            .ok_or_else(|| PipelineError::Inference(format!("no backend route for model {model}")))?;

        debug!(model, url = url.as_str(), size = payload.len(), "invoking backend");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await
            .map_err(|e| PipelineError::Inference(format!("{model}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Inference(format!(
                "{model} returned {status}: {body}"
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| PipelineError::Inference(format!("{model}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_model_is_inference_error() {
        let invoker = HttpInvoker::new(Duration::from_secs(1)).unwrap();
        let err = invoker
            .invoke("whisper", Bytes::from_static(b"audio"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
        assert!(err.to_string().contains("no backend route"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_inference_error() {
        // Port 1 refuses connections on any sane host.
        let invoker = HttpInvoker::new(Duration::from_millis(200))
            .unwrap()
            .with_route("whisper", "http://127.0.0.1:1/v1/transcribe");
        let err = invoker
            .invoke("whisper", Bytes::from_static(b"audio"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
