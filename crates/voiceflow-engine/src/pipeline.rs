use std::sync::Arc;

use bytes::Bytes;
use tracing::instrument;

use voiceflow_backend::BackendInvoker;
use voiceflow_blob::{BlobError, ObjectStore};
use voiceflow_core::job::{JobInput, ObjectRef, WorkItem};
use voiceflow_core::task::JobResult;
use voiceflow_core::PipelineError;

pub const STT_MODEL: &str = "whisper";
pub const TTS_MODEL: &str = "chatterbox";

/// Executes one work item end-to-end: artifact fetch, backend invocation,
/// artifact upload. Stateless: every output location derives from the job
/// id, so re-running after a redelivery overwrites instead of accumulating.
pub struct Pipeline {
    blob: Arc<dyn ObjectStore>,
    invoker: Arc<dyn BackendInvoker>,
}

impl Pipeline {
    pub fn new(blob: Arc<dyn ObjectStore>, invoker: Arc<dyn BackendInvoker>) -> Self {
        Self { blob, invoker }
    }

    #[instrument(skip(self, item), fields(job_id = %item.job_id, mode = %item.mode))]
    pub async fn execute(&self, item: &WorkItem) -> Result<JobResult, PipelineError> {
        match &item.input {
            JobInput::Audio { object } => {
                let audio = self.blob.get(object).await.map_err(storage_err)?;
                let text = self.invoker.invoke(STT_MODEL, audio).await?;
                let text = String::from_utf8(text.to_vec()).map_err(|_| {
                    PipelineError::Inference("backend returned invalid utf-8 transcript".into())
                })?;
                Ok(JobResult::Transcript { text })
            }
            JobInput::Text { text } => {
                let audio = self
                    .invoker
                    .invoke(TTS_MODEL, Bytes::from(text.clone()))
                    .await?;
                let output = ObjectRef::output_for(&item.job_id);
                self.blob.put(&output, audio).await.map_err(storage_err)?;
                Ok(JobResult::Audio { object: output })
            }
        }
    }

    /// Every artifact location this job touches, derived from the item.
    /// Listed unconditionally: on a failed job a partial upload may still
    /// exist, and deleting a missing object is harmless.
    pub fn artifacts(item: &WorkItem) -> Vec<ObjectRef> {
        match &item.input {
            JobInput::Audio { object } => vec![object.clone()],
            JobInput::Text { .. } => vec![ObjectRef::output_for(&item.job_id)],
        }
    }
}

fn storage_err(e: BlobError) -> PipelineError {
    PipelineError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use voiceflow_backend::{MockInvoker, MockResponse};
    use voiceflow_blob::MemoryStore;
    use voiceflow_core::ids::JobId;

    #[tokio::test]
    async fn transcription_fetches_audio_and_returns_text() {
        let blob = Arc::new(MemoryStore::new());
        let id = JobId::new();
        let input = ObjectRef::input_for(&id);
        blob.put(&input, Bytes::from_static(b"pcm")).await.unwrap();

        let invoker = Arc::new(MockInvoker::new(vec![MockResponse::text("hello world")]));
        let pipeline = Pipeline::new(blob, invoker);

        let item = WorkItem::transcription(id, input);
        let result = pipeline.execute(&item).await.unwrap();
        assert_eq!(result, JobResult::Transcript { text: "hello world".into() });
    }

    #[tokio::test]
    async fn synthesis_uploads_audio_and_returns_ref() {
        let blob = Arc::new(MemoryStore::new());
        let invoker = Arc::new(MockInvoker::new(vec![MockResponse::Payload(
            Bytes::from_static(b"RIFFwav"),
        )]));
        let pipeline = Pipeline::new(Arc::clone(&blob) as Arc<dyn ObjectStore>, invoker);

        let id = JobId::new();
        let item = WorkItem::synthesis(id.clone(), "hello");
        let result = pipeline.execute(&item).await.unwrap();

        let output = ObjectRef::output_for(&id);
        assert_eq!(result, JobResult::Audio { object: output.clone() });
        assert_eq!(blob.get(&output).await.unwrap(), Bytes::from_static(b"RIFFwav"));
    }

    #[tokio::test]
    async fn missing_input_artifact_is_storage_error() {
        let blob = Arc::new(MemoryStore::new());
        let invoker = Arc::new(MockInvoker::new(vec![MockResponse::text("unused")]));
        let pipeline = Pipeline::new(blob, Arc::clone(&invoker) as Arc<dyn BackendInvoker>);

        let id = JobId::new();
        let item = WorkItem::transcription(id.clone(), ObjectRef::input_for(&id));
        let err = pipeline.execute(&item).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
        // The backend was never reached.
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let blob = Arc::new(MemoryStore::new());
        let invoker = Arc::new(MockInvoker::new(vec![MockResponse::Error(
            PipelineError::Inference("chatterbox returned 503".into()),
        )]));
        let pipeline = Pipeline::new(blob, invoker);

        let item = WorkItem::synthesis(JobId::new(), "hello");
        let err = pipeline.execute(&item).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn artifacts_cover_both_modes() {
        let id = JobId::new();
        let stt = WorkItem::transcription(id.clone(), ObjectRef::input_for(&id));
        assert_eq!(Pipeline::artifacts(&stt), vec![ObjectRef::input_for(&id)]);

        let tts = WorkItem::synthesis(id.clone(), "hi");
        assert_eq!(Pipeline::artifacts(&tts), vec![ObjectRef::output_for(&id)]);
    }
}
