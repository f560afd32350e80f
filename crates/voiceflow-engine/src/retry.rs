use std::time::Duration;

use voiceflow_core::PipelineError;

/// What to do with a failed delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue through the broker, claimable again after the delay.
    Retry { after: Duration },
    /// Give up: write a terminal `Failed` state.
    Fail,
}

/// Explicit retry policy consulted by the dispatcher: a fixed attempt budget
/// with a fixed delay between deliveries. Fatal errors are never retried;
/// retryable errors are retried until the budget is spent.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Assess a failure on the given delivery attempt (first attempt = 1).
    pub fn assess(&self, attempt: u32, error: &PipelineError) -> RetryDecision {
        if !error.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::Fail;
        }
        RetryDecision::Retry { after: self.delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> PipelineError {
        PipelineError::Inference("backend 503".into())
    }

    #[test]
    fn retries_until_budget_spent() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10));
        assert_eq!(
            policy.assess(1, &transient()),
            RetryDecision::Retry { after: Duration::from_secs(10) }
        );
        assert_eq!(
            policy.assess(2, &transient()),
            RetryDecision::Retry { after: Duration::from_secs(10) }
        );
        // Third attempt is the last one allowed; no fourth delivery.
        assert_eq!(policy.assess(3, &transient()), RetryDecision::Fail);
    }

    #[test]
    fn storage_errors_are_retryable() {
        let policy = RetryPolicy::default();
        let err = PipelineError::Storage("connection reset".into());
        assert!(matches!(policy.assess(1, &err), RetryDecision::Retry { .. }));
    }

    #[test]
    fn fatal_errors_never_retry() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10));
        let err = PipelineError::Validation("text is required".into());
        assert_eq!(policy.assess(1, &err), RetryDecision::Fail);
    }

    #[test]
    fn default_matches_deployment() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(10));
    }
}
