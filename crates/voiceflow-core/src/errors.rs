use std::time::Duration;

/// Typed error taxonomy for the orchestration pipeline.
/// Classifies errors as fatal (don't retry), retryable, or caller-facing.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PipelineError {
    // Fatal — rejected before or during processing, never retried
    #[error("validation error: {0}")]
    Validation(String),

    // Retryable within the dispatcher's budget
    #[error("storage error: {0}")]
    Storage(String),
    #[error("inference error: {0}")]
    Inference(String),

    // Caller-facing — surfaced, not retried
    #[error("not found: {0}")]
    NotFound(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Inference(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
            Self::Inference(_) => "inference",
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(PipelineError::Storage("disk full".into()).is_retryable());
        assert!(PipelineError::Inference("backend 503".into()).is_retryable());
        assert!(!PipelineError::Validation("empty input".into()).is_retryable());
        assert!(!PipelineError::NotFound("job_x".into()).is_retryable());
        assert!(!PipelineError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn fatal_classification() {
        assert!(PipelineError::Validation("empty input".into()).is_fatal());
        assert!(!PipelineError::Storage("io".into()).is_fatal());
        assert!(!PipelineError::Inference("503".into()).is_fatal());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(PipelineError::Validation("x".into()).error_kind(), "validation");
        assert_eq!(PipelineError::Storage("x".into()).error_kind(), "storage");
        assert_eq!(PipelineError::Inference("x".into()).error_kind(), "inference");
        assert_eq!(PipelineError::NotFound("x".into()).error_kind(), "not_found");
        assert_eq!(
            PipelineError::Timeout(Duration::from_secs(1)).error_kind(),
            "timeout"
        );
    }

    #[test]
    fn messages_are_human_readable() {
        let err = PipelineError::Inference("whisper returned 503".into());
        assert_eq!(err.to_string(), "inference error: whisper returned 503");
    }
}
