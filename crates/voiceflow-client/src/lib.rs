//! Client for the VoiceFlow gateway: submission helpers, one-shot result
//! lookup, and a bounded polling wait.

use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use voiceflow_core::task::TaskStatus;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(String),

    #[error("api error {status}: {detail}")]
    Api { status: u16, detail: String },

    /// The polling budget ran out. This is a client give-up signal, not a
    /// cancellation: the job may still complete, and a later lookup of the
    /// same id may succeed.
    #[error("timed out after {waited:?} waiting for job {job_id}")]
    Timeout { job_id: String, waited: Duration },

    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Http(e.to_string())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Submitted {
    pub task_id: String,
    pub status: TaskStatus,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub transcribed_text: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

pub struct VoiceflowClient {
    base_url: String,
    http: reqwest::Client,
}

impl VoiceflowClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit audio for transcription. Returns as soon as the job is queued.
    pub async fn transcribe(&self, audio: Bytes) -> Result<Submitted, ClientError> {
        let response = self
            .http
            .post(format!("{}/v1/transcribe", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio)
            .send()
            .await?;
        decode(response).await
    }

    /// Submit text for synthesis. Returns as soon as the job is queued.
    pub async fn synthesize(&self, text: &str) -> Result<Submitted, ClientError> {
        let response = self
            .http
            .post(format!("{}/v1/synthesize", self.base_url))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        decode(response).await
    }

    /// One poll of a task's current state.
    pub async fn result(&self, job_id: &str) -> Result<TaskResult, ClientError> {
        let response = self
            .http
            .get(format!("{}/v1/tasks/{job_id}", self.base_url))
            .send()
            .await?;
        decode(response).await
    }

    /// Poll until the task leaves `Pending`, sleeping `interval` between
    /// checks, bounded by `timeout` of wall clock. Stopping early has no
    /// effect on the in-flight job.
    pub async fn wait_for_result(
        &self,
        job_id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<TaskResult, ClientError> {
        let started = Instant::now();
        loop {
            let result = self.result(job_id).await?;
            if result.status != TaskStatus::Pending {
                debug!(job_id, status = %result.status, "task reached terminal state");
                return Ok(result);
            }
            if started.elapsed() >= timeout {
                return Err(ClientError::Timeout {
                    job_id: job_id.to_string(),
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Download a signed artifact URL as returned in `TaskResult::audio_url`.
    pub async fn fetch_audio(&self, audio_url: &str) -> Result<Bytes, ClientError> {
        let url = if audio_url.starts_with("http://") || audio_url.starts_with("https://") {
            audio_url.to_string()
        } else {
            format!("{}{audio_url}", self.base_url)
        };
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response.bytes().await?)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let detail = match response.json::<ErrorBody>().await {
            Ok(body) => body.detail,
            Err(_) => status.to_string(),
        };
        return Err(ClientError::Api {
            status: status.as_u16(),
            detail,
        });
    }
    response
        .json()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use secrecy::SecretString;
    use tokio_util::sync::CancellationToken;

    use voiceflow_backend::{MockInvoker, MockResponse};
    use voiceflow_blob::{MemoryStore, ObjectStore, UrlSigner};
    use voiceflow_engine::{Dispatcher, DispatcherConfig, RetryPolicy};
    use voiceflow_server::{start, AppState, ServerConfig};
    use voiceflow_store::Database;
    use voiceflow_telemetry::PipelineMetrics;

    #[test]
    fn base_url_is_normalized() {
        let client = VoiceflowClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    async fn start_stack(invoker: MockInvoker, token: &CancellationToken) -> VoiceflowClient {
        let db = Database::in_memory().unwrap();
        let blob: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let signer = Arc::new(UrlSigner::new(SecretString::from("test-secret".to_string())));
        let metrics = Arc::new(PipelineMetrics::new());

        let state = AppState::new(
            db.clone(),
            Arc::clone(&blob),
            signer,
            Arc::clone(&metrics),
            Duration::from_secs(900),
        );
        let handle = start(
            ServerConfig {
                port: 0,
                ..Default::default()
            },
            state,
        )
        .await
        .unwrap();

        let dispatcher = Arc::new(Dispatcher::new(
            db,
            blob,
            Arc::new(invoker),
            DispatcherConfig {
                workers: 1,
                idle_poll: Duration::from_millis(10),
                retry: RetryPolicy::new(3, Duration::ZERO),
                ..Default::default()
            },
            metrics,
        ));
        dispatcher.spawn(token.clone());

        VoiceflowClient::new(format!("http://127.0.0.1:{}", handle.port))
    }

    #[tokio::test]
    async fn short_poll_times_out_then_later_poll_succeeds() {
        let token = CancellationToken::new();
        // The backend takes ~300ms; the first wait gives up after ~60ms.
        let client = start_stack(
            MockInvoker::new(vec![MockResponse::delayed(
                Duration::from_millis(300),
                MockResponse::Payload(Bytes::from_static(b"RIFFslow")),
            )]),
            &token,
        )
        .await;

        let submitted = client.synthesize("hello").await.unwrap();
        assert_eq!(submitted.status, TaskStatus::Pending);

        let err = client
            .wait_for_result(&submitted.task_id, Duration::from_millis(60), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));

        // The job was never cancelled: it completes, and a later poll of
        // the same id succeeds.
        let result = client
            .wait_for_result(&submitted.task_id, Duration::from_secs(5), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Success);

        let audio_url = result.audio_url.unwrap();
        let audio = client.fetch_audio(&audio_url).await.unwrap();
        assert_eq!(audio, Bytes::from_static(b"RIFFslow"));

        token.cancel();
    }

    #[tokio::test]
    async fn validation_errors_surface_as_api_errors() {
        let token = CancellationToken::new();
        let client = start_stack(MockInvoker::new(vec![]), &token).await;

        let err = client.synthesize("   ").await.unwrap_err();
        match err {
            ClientError::Api { status, detail } => {
                assert_eq!(status, 400);
                assert!(detail.contains("text content is required"));
            }
            other => panic!("expected api error, got {other:?}"),
        }

        let err = client.transcribe(Bytes::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 400, .. }));

        token.cancel();
    }

    #[tokio::test]
    async fn unknown_job_lookup_is_api_404() {
        let token = CancellationToken::new();
        let client = start_stack(MockInvoker::new(vec![]), &token).await;

        let err = client.result("job_does_not_exist").await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 404, .. }));

        token.cancel();
    }

    #[tokio::test]
    async fn transcription_roundtrip_via_client() {
        let token = CancellationToken::new();
        let client = start_stack(
            MockInvoker::new(vec![MockResponse::text("the quick brown fox")]),
            &token,
        )
        .await;

        let submitted = client.transcribe(Bytes::from_static(b"pcm")).await.unwrap();
        let result = client
            .wait_for_result(&submitted.task_id, Duration::from_secs(5), Duration::from_millis(20))
            .await
            .unwrap();

        assert_eq!(result.status, TaskStatus::Success);
        assert_eq!(result.transcribed_text.as_deref(), Some("the quick brown fox"));
        assert!(result.error_message.is_none());

        token.cancel();
    }
}
