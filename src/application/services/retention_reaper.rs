use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::application::ports::{BrokerChannel, JobStatusStore, StagingStore, StoreError};
use crate::domain::{Job, JobError, JobErrorKind, JobId, JobStatus, StoragePath, TaskMessage};

use super::{BatchOrchestrator, RetryPolicy};

#[derive(Debug, Clone, Copy)]
pub struct RetentionSettings {
    /// How long finished jobs and batches stay queryable.
    pub job_ttl: Duration,
    /// A job running for longer than this is assumed to have lost its worker.
    pub stale_running_after: Duration,
    /// A job pending unchanged for longer than this is assumed to have lost
    /// its task, and the task is published again.
    pub stale_pending_after: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_jobs: usize,
    pub expired_batches: usize,
    pub recovered_jobs: usize,
    pub requeued_jobs: usize,
}

/// Expires finished records with their staged blobs, recovers jobs whose
/// worker disappeared mid-conversion and republishes tasks for pending jobs
/// that lost theirs.
pub struct RetentionReaper {
    store: Arc<dyn JobStatusStore>,
    staging: Arc<dyn StagingStore>,
    broker: Arc<dyn BrokerChannel>,
    orchestrator: Arc<BatchOrchestrator>,
    policy: RetryPolicy,
    settings: RetentionSettings,
}

impl RetentionReaper {
    pub fn new(
        store: Arc<dyn JobStatusStore>,
        staging: Arc<dyn StagingStore>,
        broker: Arc<dyn BrokerChannel>,
        orchestrator: Arc<BatchOrchestrator>,
        policy: RetryPolicy,
        settings: RetentionSettings,
    ) -> Self {
        Self {
            store,
            staging,
            broker,
            orchestrator,
            policy,
            settings,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.settings.sweep_interval.as_secs(),
            "Retention reaper started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.sweep(Utc::now()).await {
                        Ok(report) if report != SweepReport::default() => {
                            tracing::info!(
                                expired_jobs = report.expired_jobs,
                                expired_batches = report.expired_batches,
                                recovered_jobs = report.recovered_jobs,
                                requeued_jobs = report.requeued_jobs,
                                "Retention sweep completed"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Retention sweep failed"),
                    }
                }
            }
        }

        tracing::info!("Retention reaper stopped");
    }

    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let cutoff = older_than(now, self.settings.job_ttl);
        let mut report = SweepReport::default();

        for batch_id in self.store.list_batches_completed_before(cutoff).await? {
            let Some(batch) = self.store.get_batch(batch_id).await? else {
                continue;
            };
            let children = self.store.get_jobs(&batch.job_ids).await?;
            self.store.expire_batch(batch_id).await?;
            for job in &children {
                self.discard_blob(job).await;
            }
            report.expired_jobs += children.len();
            report.expired_batches += 1;
        }

        for completed in self.store.list_standalone_jobs_completed_before(cutoff).await? {
            self.store.expire_job(completed.id).await?;
            if let Some(path) = &completed.storage_path {
                self.discard_path(completed.id, path).await;
            }
            report.expired_jobs += 1;
        }

        // Ahead of recovery: jobs recovered below already have a fresh task.
        let pending_cutoff = older_than(now, self.settings.stale_pending_after);
        for job in self.store.list_jobs_by_status(JobStatus::Pending).await? {
            if job.updated_at < pending_cutoff && self.requeue(&job, now).await? {
                report.requeued_jobs += 1;
            }
        }

        let stale_cutoff = older_than(now, self.settings.stale_running_after);
        for job in self.store.list_jobs_by_status(JobStatus::Running).await? {
            let stale = job.started_at.is_some_and(|started| started < stale_cutoff);
            if stale && self.recover(job, now).await? {
                report.recovered_jobs += 1;
            }
        }

        Ok(report)
    }

    /// Publishes the pending job's task again. The job is touched first so a
    /// crash after the touch is caught by a later sweep. A duplicate task is
    /// dropped by whichever worker loses the claim.
    async fn requeue(&self, job: &Job, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let Some(task) = TaskMessage::for_job(job) else {
            return Ok(false);
        };
        let Ok(touched) = job.requeued(now) else {
            return Ok(false);
        };

        match self
            .store
            .compare_and_set_job(job.id, JobStatus::Pending, &touched)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_conflict() => return Ok(false),
            Err(StoreError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        }

        if let Err(e) = self.broker.publish(&task, Duration::ZERO).await {
            tracing::warn!(job_id = %job.id, error = %e, "Task republication failed");
            return Ok(false);
        }
        tracing::warn!(
            job_id = %job.id,
            attempt = task.attempt,
            "Republished task for orphaned pending job"
        );
        Ok(true)
    }

    /// Counts the lost attempt as a timeout and routes the job through the
    /// regular retry path.
    async fn recover(&self, job: Job, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let error = JobError::new(
            JobErrorKind::Timeout,
            "worker did not report an outcome before the deadline",
        );
        let Ok(next) = job.record_failure(error, self.policy.max_retries, now) else {
            return Ok(false);
        };

        match self
            .store
            .compare_and_set_job(job.id, JobStatus::Running, &next)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_conflict() => return Ok(false),
            Err(e) => return Err(e),
        }
        tracing::warn!(job_id = %job.id, retry_count = next.retry_count, "Recovered stale running job");

        let mut settled = next;
        if settled.status == JobStatus::Pending {
            if let Some(task) = TaskMessage::for_job(&settled) {
                let delay = self.policy.backoff_for(settled.retry_count);
                if let Err(e) = self.broker.publish(&task, delay).await {
                    tracing::warn!(job_id = %job.id, error = %e, "Retry publication failed, failing job");
                    if let Ok(failed) = settled.dispatch_failed(format!("retry not published: {e}"), now) {
                        match self
                            .store
                            .compare_and_set_job(job.id, JobStatus::Pending, &failed)
                            .await
                        {
                            Ok(()) => settled = failed,
                            Err(e) if e.is_conflict() => {}
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        }

        if settled.is_terminal() {
            if let Some(batch_id) = settled.batch_id {
                self.orchestrator.on_child_settled(batch_id).await?;
            }
        }
        Ok(true)
    }

    async fn discard_blob(&self, job: &Job) {
        if let Some(document) = &job.input.document {
            self.discard_path(job.id, &document.storage_path).await;
        }
    }

    async fn discard_path(&self, job_id: JobId, path: &StoragePath) {
        if let Err(e) = self.staging.delete(path).await {
            tracing::debug!(job_id = %job_id, error = %e, "Staged document not deleted");
        }
    }
}

fn older_than(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
