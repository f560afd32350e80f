use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use voiceflow_backend::BackendInvoker;
use voiceflow_blob::ObjectStore;
use voiceflow_store::{CleanupRepo, Database, Delivery, JobQueue, TaskRepo};
use voiceflow_telemetry::PipelineMetrics;

use crate::pipeline::Pipeline;
use crate::retry::{RetryDecision, RetryPolicy};

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub workers: usize,
    /// How long a claim stays invisible to other workers. Must comfortably
    /// exceed the longest expected pipeline run.
    pub queue_lease: Duration,
    /// Sleep between queue checks when idle.
    pub idle_poll: Duration,
    pub cleanup_ttl: Duration,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_lease: Duration::from_secs(600),
            idle_poll: Duration::from_millis(500),
            cleanup_ttl: Duration::from_secs(3600),
            retry: RetryPolicy::default(),
        }
    }
}

/// Drains the work queue and executes one pipeline per delivered item.
///
/// Acknowledgment is late: an item is acked only after its terminal state
/// is durably written, so a crash mid-processing surfaces as a lease expiry
/// and the item is redelivered. Every side effect here is keyed by job id
/// and idempotent, which makes that redelivery safe.
pub struct Dispatcher {
    tasks: TaskRepo,
    queue: JobQueue,
    cleanup: CleanupRepo,
    pipeline: Pipeline,
    config: DispatcherConfig,
    metrics: Arc<PipelineMetrics>,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        blob: Arc<dyn ObjectStore>,
        invoker: Arc<dyn BackendInvoker>,
        config: DispatcherConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            tasks: TaskRepo::new(db.clone()),
            queue: JobQueue::new(db.clone()),
            cleanup: CleanupRepo::new(db),
            pipeline: Pipeline::new(blob, invoker),
            config,
            metrics,
        }
    }

    /// Start the worker pool. Workers run until the token is cancelled.
    pub fn spawn(self: &Arc<Self>, token: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..self.config.workers)
            .map(|worker| {
                let dispatcher = Arc::clone(self);
                let token = token.clone();
                tokio::spawn(async move {
                    dispatcher.worker_loop(worker, token).await;
                })
            })
            .collect()
    }

    async fn worker_loop(&self, worker: usize, token: CancellationToken) {
        info!(worker, "dispatcher worker started");
        loop {
            if token.is_cancelled() {
                break;
            }
            match self.queue.claim(self.config.queue_lease) {
                Ok(Some(delivery)) => {
                    if let Err(e) = self.process(delivery).await {
                        // Leave the item leased; it redelivers once the
                        // lease lapses.
                        warn!(worker, error = %e, "delivery processing hit a store error");
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.config.idle_poll) => {}
                    }
                }
                Err(e) => {
                    warn!(worker, error = %e, "queue claim failed");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.config.idle_poll) => {}
                    }
                }
            }
        }
        info!(worker, "dispatcher worker stopped");
    }

    /// Execute one delivery to completion: pipeline, terminal write, cleanup
    /// registration, then acknowledgment, in that order.
    pub async fn process(&self, delivery: Delivery) -> Result<(), voiceflow_store::StoreError> {
        let item = &delivery.item;
        let job_id = item.job_id.clone();

        match self.pipeline.execute(item).await {
            Ok(result) => {
                let applied = self.tasks.succeed(&job_id, &result)?;
                if !applied {
                    info!(job_id = %job_id, "task already terminal, redelivery ignored");
                }
                self.cleanup
                    .schedule(&job_id, &Pipeline::artifacts(item), self.config.cleanup_ttl)?;
                self.queue.ack(delivery.receipt)?;
                self.metrics.job_succeeded();
                info!(job_id = %job_id, attempt = delivery.attempt, "job succeeded");
                Ok(())
            }
            Err(error) => match self.config.retry.assess(delivery.attempt, &error) {
                RetryDecision::Retry { after } => {
                    self.metrics.retry();
                    warn!(
                        job_id = %job_id,
                        attempt = delivery.attempt,
                        max_attempts = self.config.retry.max_attempts,
                        delay_ms = after.as_millis() as u64,
                        error = %error,
                        "retrying via queue redelivery"
                    );
                    self.queue.nack(delivery.receipt, after)
                }
                RetryDecision::Fail => {
                    let applied = self.tasks.fail(&job_id, &error.to_string())?;
                    if !applied {
                        info!(job_id = %job_id, "task already terminal, redelivery ignored");
                    }
                    // Failed jobs are scheduled too; partial uploads may
                    // have happened before the failure.
                    self.cleanup
                        .schedule(&job_id, &Pipeline::artifacts(item), self.config.cleanup_ttl)?;
                    self.queue.ack(delivery.receipt)?;
                    self.metrics.job_failed();
                    warn!(
                        job_id = %job_id,
                        attempt = delivery.attempt,
                        kind = error.error_kind(),
                        error = %error,
                        "job failed terminally"
                    );
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use voiceflow_backend::{MockInvoker, MockResponse};
    use voiceflow_blob::MemoryStore;
    use voiceflow_core::ids::JobId;
    use voiceflow_core::job::{JobMode, ObjectRef, WorkItem};
    use voiceflow_core::task::{TaskState, TaskStatus};
    use voiceflow_core::PipelineError;

    struct Harness {
        dispatcher: Dispatcher,
        tasks: TaskRepo,
        queue: JobQueue,
        cleanup: CleanupRepo,
        blob: Arc<MemoryStore>,
    }

    fn harness(invoker: MockInvoker) -> Harness {
        let db = Database::in_memory().unwrap();
        let blob = Arc::new(MemoryStore::new());
        let config = DispatcherConfig {
            workers: 1,
            queue_lease: Duration::ZERO,
            idle_poll: Duration::from_millis(10),
            cleanup_ttl: Duration::from_secs(3600),
            retry: RetryPolicy::new(3, Duration::ZERO),
        };
        let dispatcher = Dispatcher::new(
            db.clone(),
            Arc::clone(&blob) as Arc<dyn ObjectStore>,
            Arc::new(invoker),
            config,
            Arc::new(PipelineMetrics::new()),
        );
        Harness {
            dispatcher,
            tasks: TaskRepo::new(db.clone()),
            queue: JobQueue::new(db.clone()),
            cleanup: CleanupRepo::new(db),
            blob,
        }
    }

    fn submit_synthesis(h: &Harness, text: &str) -> JobId {
        let id = JobId::new();
        h.tasks.insert_pending(&id, JobMode::TextToSpeech).unwrap();
        h.queue.enqueue(&WorkItem::synthesis(id.clone(), text)).unwrap();
        id
    }

    /// Claim-and-process until the queue drains, like a worker loop would.
    async fn drain(h: &Harness) -> usize {
        let mut processed = 0;
        while let Some(delivery) = h.queue.claim(Duration::ZERO).unwrap() {
            h.dispatcher.process(delivery).await.unwrap();
            processed += 1;
        }
        processed
    }

    #[tokio::test]
    async fn success_writes_terminal_state_and_schedules_cleanup() {
        let h = harness(MockInvoker::always(Bytes::from_static(b"RIFFwav")));
        let id = submit_synthesis(&h, "hello");

        drain(&h).await;

        let row = h.tasks.get(&id).unwrap();
        assert_eq!(row.state.status(), TaskStatus::Success);
        assert!(h.queue.is_empty().unwrap());
        assert_eq!(h.cleanup.len().unwrap(), 1);
        assert!(h.blob.contains(&ObjectRef::output_for(&id)));
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_fails_terminally() {
        let h = harness(MockInvoker::new(vec![
            MockResponse::Error(PipelineError::Inference("503 (1)".into())),
            MockResponse::Error(PipelineError::Inference("503 (2)".into())),
            MockResponse::Error(PipelineError::Inference("503 (3)".into())),
        ]));
        let id = submit_synthesis(&h, "hello");

        let processed = drain(&h).await;
        // Three deliveries, no fourth attempt.
        assert_eq!(processed, 3);

        match h.tasks.get(&id).unwrap().state {
            TaskState::Failed { error } => assert!(error.contains("503 (3)"), "got: {error}"),
            other => panic!("expected failed, got {other:?}"),
        }
        assert!(h.queue.is_empty().unwrap());
        // Failure still schedules cleanup.
        assert_eq!(h.cleanup.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn fatal_error_fails_without_retry() {
        let h = harness(MockInvoker::new(vec![MockResponse::Error(
            PipelineError::Validation("text is required".into()),
        )]));
        let id = submit_synthesis(&h, "hello");

        let processed = drain(&h).await;
        assert_eq!(processed, 1);
        assert_eq!(h.tasks.get(&id).unwrap().state.status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn redelivery_after_crash_is_idempotent() {
        let h = harness(MockInvoker::always(Bytes::from_static(b"RIFFwav")));
        let id = submit_synthesis(&h, "hello");

        // Two claims of the same item: the zero-length lease makes the first
        // claim look like a worker that crashed mid-processing.
        let first = h.queue.claim(Duration::ZERO).unwrap().unwrap();
        let second = h.queue.claim(Duration::ZERO).unwrap().unwrap();
        assert_eq!(first.receipt, second.receipt);
        assert_eq!(second.attempt, 2);

        h.dispatcher.process(first).await.unwrap();
        h.dispatcher.process(second).await.unwrap();

        // Same terminal state, one artifact, no accumulation.
        assert_eq!(h.tasks.get(&id).unwrap().state.status(), TaskStatus::Success);
        assert_eq!(h.blob.len(), 1);
        assert!(h.queue.is_empty().unwrap());
        assert_eq!(h.cleanup.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn worker_pool_processes_and_stops_on_cancel() {
        let h = harness(MockInvoker::always(Bytes::from_static(b"RIFFwav")));
        let id = submit_synthesis(&h, "hello");

        let token = CancellationToken::new();
        let dispatcher = Arc::new(h.dispatcher);
        let handles = dispatcher.spawn(token.clone());

        // Wait for the pool to drain the queue.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if h.tasks.get(&id).unwrap().state.is_terminal() {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "job never completed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        token.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
