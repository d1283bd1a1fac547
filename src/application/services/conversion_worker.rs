use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::{
    BrokerChannel, Delivery, JobStatusStore, StagingStore, StoreError,
};
use crate::domain::{
    ConversionResult, InvalidTransition, Job, JobError, JobErrorKind, JobStatus, SourceDocument,
    TaskMessage,
};

use super::{BatchOrchestrator, ConversionRunner, RetryPolicy};

/// What a worker did with one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Succeeded,
    /// The attempt failed and a delayed retry was published.
    Retrying,
    Failed,
    /// The message no longer matched its job and was dropped.
    Skipped,
}

/// A failed attempt and whether another attempt could change the outcome.
struct AttemptFailure {
    error: JobError,
    retryable: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("status store: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Transition(#[from] InvalidTransition),
}

/// Consumes conversion tasks and drives their jobs through the lifecycle.
#[derive(Clone)]
pub struct ConversionWorker {
    broker: Arc<dyn BrokerChannel>,
    store: Arc<dyn JobStatusStore>,
    staging: Arc<dyn StagingStore>,
    orchestrator: Arc<BatchOrchestrator>,
    runner: ConversionRunner,
    policy: RetryPolicy,
    idle_backoff: Duration,
}

impl ConversionWorker {
    pub fn new(
        broker: Arc<dyn BrokerChannel>,
        store: Arc<dyn JobStatusStore>,
        staging: Arc<dyn StagingStore>,
        orchestrator: Arc<BatchOrchestrator>,
        runner: ConversionRunner,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            broker,
            store,
            staging,
            orchestrator,
            runner,
            policy,
            idle_backoff: Duration::from_millis(500),
        }
    }

    /// Delay after a failed consume before polling the broker again.
    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    /// Processes deliveries until `cancel` fires. A delivery already claimed
    /// when cancellation arrives is finished first.
    pub async fn run(self, worker_id: usize, cancel: CancellationToken) {
        tracing::info!(worker_id, "Conversion worker started");

        loop {
            let delivery = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                delivery = self.broker.consume() => delivery,
            };

            match delivery {
                Ok(delivery) => {
                    let span = tracing::info_span!(
                        "conversion_job",
                        worker_id,
                        job_id = %delivery.task.job_id,
                        filename = %delivery.task.filename,
                        attempt = delivery.task.attempt,
                        delivery_count = delivery.delivery_count,
                    );
                    if let Err(e) = self.handle_delivery(delivery).instrument(span).await {
                        tracing::error!(worker_id, error = %e, "Delivery handling failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(worker_id, error = %e, "Broker consume failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.idle_backoff) => {}
                    }
                }
            }
        }

        tracing::info!(worker_id, "Conversion worker stopped");
    }

    /// Handles one delivery end to end and acknowledges it once the job's
    /// next state is committed. Store failures release the delivery for a
    /// later redelivery instead.
    pub async fn handle_delivery(&self, delivery: Delivery) -> Result<DeliveryOutcome, WorkerError> {
        match self.process(&delivery.task).await {
            Ok(outcome) => {
                self.acknowledge(&delivery).await;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(nack_err) = self
                    .broker
                    .nack(&delivery, self.policy.backoff_base)
                    .await
                {
                    tracing::warn!(error = %nack_err, "Failed to release delivery");
                }
                Err(e)
            }
        }
    }

    async fn process(&self, task: &TaskMessage) -> Result<DeliveryOutcome, WorkerError> {
        let Some(job) = self.store.get_job(task.job_id).await? else {
            tracing::info!("Job no longer exists, dropping task");
            return Ok(DeliveryOutcome::Skipped);
        };

        if job.status != JobStatus::Pending || job.retry_count != task.attempt {
            tracing::info!(
                status = %job.status,
                retry_count = job.retry_count,
                "Stale task for job, dropping"
            );
            return Ok(DeliveryOutcome::Skipped);
        }

        let running = job.begin(Utc::now())?;
        match self
            .store
            .compare_and_set_job(job.id, JobStatus::Pending, &running)
            .await
        {
            Ok(()) => tracing::debug!(status = %running.status, "Job status transition"),
            Err(e) if e.is_conflict() => {
                tracing::info!("Job claimed elsewhere, dropping task");
                return Ok(DeliveryOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        let attempt = self.attempt(task).await;

        let (next, outcome) = match attempt {
            Ok(result) => (running.succeed(result, Utc::now())?, DeliveryOutcome::Succeeded),
            Err(failure) => {
                let max_retries = if failure.retryable {
                    self.policy.max_retries
                } else {
                    0
                };
                let next = running.record_failure(failure.error, max_retries, Utc::now())?;
                let outcome = if next.status == JobStatus::Pending {
                    DeliveryOutcome::Retrying
                } else {
                    DeliveryOutcome::Failed
                };
                (next, outcome)
            }
        };

        match self
            .store
            .compare_and_set_job(running.id, JobStatus::Running, &next)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                tracing::warn!("Job left running state during conversion, discarding outcome");
                return Ok(DeliveryOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        let (settled, outcome) = match outcome {
            DeliveryOutcome::Retrying => self.schedule_retry(next).await?,
            other => (next, other),
        };

        match outcome {
            DeliveryOutcome::Succeeded => tracing::info!("Conversion succeeded"),
            DeliveryOutcome::Retrying => tracing::info!(
                retry_count = settled.retry_count,
                "Conversion attempt failed, retry scheduled"
            ),
            DeliveryOutcome::Failed => tracing::warn!(
                retry_count = settled.retry_count,
                error = ?settled.error,
                "Conversion failed"
            ),
            DeliveryOutcome::Skipped => {}
        }

        if settled.is_terminal() {
            self.settle_batch(&settled).await;
        }

        Ok(outcome)
    }

    async fn attempt(&self, task: &TaskMessage) -> Result<ConversionResult, AttemptFailure> {
        let data = self
            .staging
            .fetch(&task.document.storage_path)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Staged document unavailable");
                AttemptFailure {
                    error: JobError::new(
                        JobErrorKind::Conversion,
                        format!("staged document unavailable: {e}"),
                    ),
                    retryable: true,
                }
            })?;

        let document = SourceDocument::new(task.filename.clone(), task.document.format, data);
        self.runner
            .run(&document, &task.options)
            .await
            .map_err(|e| AttemptFailure {
                error: JobError::from(&e),
                retryable: e.is_retryable(),
            })
    }

    /// Publishes the next attempt with backoff. If that fails the job is
    /// failed with a dispatch error rather than left pending.
    async fn schedule_retry(&self, job: Job) -> Result<(Job, DeliveryOutcome), WorkerError> {
        let Some(task) = TaskMessage::for_job(&job) else {
            return Ok((job, DeliveryOutcome::Failed));
        };
        let delay = self.policy.backoff_for(job.retry_count);

        let Err(e) = self.broker.publish(&task, delay).await else {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Retry published");
            return Ok((job, DeliveryOutcome::Retrying));
        };

        tracing::warn!(error = %e, "Retry publication failed, failing job");
        let failed = job.dispatch_failed(format!("retry not published: {e}"), Utc::now())?;
        match self
            .store
            .compare_and_set_job(job.id, JobStatus::Pending, &failed)
            .await
        {
            Ok(()) => Ok((failed, DeliveryOutcome::Failed)),
            Err(e) if e.is_conflict() => Ok((job, DeliveryOutcome::Skipped)),
            Err(e) => Err(e.into()),
        }
    }

    async fn settle_batch(&self, job: &Job) {
        let Some(batch_id) = job.batch_id else {
            return;
        };
        if let Err(e) = self.orchestrator.on_child_settled(batch_id).await {
            tracing::error!(batch_id = %batch_id, error = %e, "Failed to update batch aggregate");
        }
    }

    async fn acknowledge(&self, delivery: &Delivery) {
        if let Err(e) = self.broker.ack(delivery).await {
            tracing::warn!(error = %e, "Failed to acknowledge delivery");
        }
    }
}
