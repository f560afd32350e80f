use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;

use voiceflow_blob::sign::unix_now;
use voiceflow_blob::{BlobError, ObjectStore, UrlSigner};
use voiceflow_core::ids::JobId;
use voiceflow_core::job::{JobMode, ObjectRef, WorkItem};
use voiceflow_core::task::{JobResult, TaskState, TaskStatus};
use voiceflow_core::PipelineError;
use voiceflow_store::{Database, JobQueue, StoreError, TaskRepo};
use voiceflow_telemetry::PipelineMetrics;

/// Shared application state passed to Axum handlers. Stateless beyond
/// these injected handles; all shared mutable state lives in the store.
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskRepo,
    pub queue: JobQueue,
    pub blob: Arc<dyn ObjectStore>,
    pub signer: Arc<UrlSigner>,
    pub metrics: Arc<PipelineMetrics>,
    pub url_ttl: Duration,
}

impl AppState {
    pub fn new(
        db: Database,
        blob: Arc<dyn ObjectStore>,
        signer: Arc<UrlSigner>,
        metrics: Arc<PipelineMetrics>,
        url_ttl: Duration,
    ) -> Self {
        Self {
            tasks: TaskRepo::new(db.clone()),
            queue: JobQueue::new(db),
            blob,
            signer,
            metrics,
            url_ttl,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: JobId,
    pub status: TaskStatus,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

/// Wire shape of a task lookup. Mirrors the tagged internal state onto the
/// original optional-field response: exactly one of the optional fields is
/// populated for a terminal task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskResultResponse {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcribed_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Error envelope: a status code plus a `{"detail": ...}` body. User-visible
/// failure is always structured, never a stack trace.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn forbidden(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            detail: detail.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Inference(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        Self {
            status,
            detail: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

fn store_err(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(what) => PipelineError::NotFound(what).into(),
        other => PipelineError::Storage(other.to_string()).into(),
    }
}

/// `POST /v1/transcribe`: submit an audio transcription job.
///
/// Returns as soon as the job is enqueued; completion is observed by
/// polling. If the input upload fails the job is never enqueued, so no
/// orphaned queue entry can exist.
pub async fn transcribe(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    if body.is_empty() {
        return Err(PipelineError::Validation("audio file is required".into()).into());
    }

    let job_id = JobId::new();
    let input = ObjectRef::input_for(&job_id);
    state
        .blob
        .put(&input, body)
        .await
        .map_err(|e| PipelineError::Storage(format!("failed to upload file: {e}")))?;

    state
        .tasks
        .insert_pending(&job_id, JobMode::SpeechToText)
        .map_err(store_err)?;
    state
        .queue
        .enqueue(&WorkItem::transcription(job_id.clone(), input))
        .map_err(store_err)?;

    state.metrics.job_submitted();
    info!(job_id = %job_id, mode = %JobMode::SpeechToText, "job submitted");

    Ok(Json(SubmitResponse {
        task_id: job_id,
        status: TaskStatus::Pending,
    }))
}

/// `POST /v1/synthesize`: submit a text-to-speech job.
pub async fn synthesize(
    State(state): State<AppState>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(PipelineError::Validation("text content is required".into()).into());
    }

    let job_id = JobId::new();
    state
        .tasks
        .insert_pending(&job_id, JobMode::TextToSpeech)
        .map_err(store_err)?;
    state
        .queue
        .enqueue(&WorkItem::synthesis(job_id.clone(), text))
        .map_err(store_err)?;

    state.metrics.job_submitted();
    info!(job_id = %job_id, mode = %JobMode::TextToSpeech, "job submitted");

    Ok(Json(SubmitResponse {
        task_id: job_id,
        status: TaskStatus::Pending,
    }))
}

/// `GET /v1/tasks/{job_id}`: poll a task.
///
/// Audio results are converted to a signed URL here, at read time, so the
/// URL's validity window is measured from the moment of observation rather
/// than from completion.
pub async fn task_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<TaskResultResponse>, ApiError> {
    let job_id = JobId::from_raw(job_id);
    let row = state.tasks.get(&job_id).map_err(store_err)?;

    let mut response = TaskResultResponse {
        task_id: job_id.to_string(),
        status: row.state.status(),
        transcribed_text: None,
        audio_url: None,
        error_message: None,
    };

    match row.state {
        TaskState::Pending => {}
        TaskState::Success { result } => match result {
            JobResult::Transcript { text } => response.transcribed_text = Some(text),
            JobResult::Audio { object } => {
                response.audio_url = Some(state.signer.presign(&object, state.url_ttl));
            }
        },
        TaskState::Failed { error } => response.error_message = Some(error),
    }

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ArtifactQuery {
    pub expires: i64,
    pub sig: String,
}

/// `GET /v1/artifacts/{bucket}/{key}`: download a signed artifact.
pub async fn artifact(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<ArtifactQuery>,
) -> Result<Response, ApiError> {
    let location = ObjectRef::new(bucket, key);
    if !state
        .signer
        .verify(&location, query.expires, &query.sig, unix_now())
    {
        return Err(ApiError::forbidden("signature invalid or expired"));
    }

    let bytes = state.blob.get(&location).await.map_err(|e| match e {
        BlobError::NotFound(what) => PipelineError::NotFound(what).into(),
        other => ApiError::from(PipelineError::Storage(other.to_string())),
    })?;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response())
}

/// `GET /health`: liveness only; never probes downstream dependencies.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
