pub mod http;
pub mod mock;

pub use http::HttpInvoker;
pub use mock::{MockInvoker, MockResponse};

use async_trait::async_trait;
use bytes::Bytes;
use voiceflow_core::PipelineError;

/// A synchronous request/response call to a stateless inference backend.
///
/// Deliberately dumb: no retry logic lives here (retry is the dispatcher's
/// responsibility) and the call has no side effects beyond itself.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    async fn invoke(&self, model: &str, payload: Bytes) -> Result<Bytes, PipelineError>;
}
