use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::application::ports::{JobStatusStore, StoreError};
use crate::domain::{Batch, BatchId, Job};

/// Fans batches out into child jobs and keeps the aggregate in step with them.
pub struct BatchOrchestrator {
    store: Arc<dyn JobStatusStore>,
}

impl BatchOrchestrator {
    pub fn new(store: Arc<dyn JobStatusStore>) -> Self {
        Self { store }
    }

    /// Creates the batch record and its children atomically.
    #[instrument(skip(self, jobs), fields(batch_id = %batch_id, jobs = jobs.len()))]
    pub async fn create_batch(&self, batch_id: BatchId, jobs: &[Job]) -> Result<Batch, StoreError> {
        let batch = Batch::new(
            batch_id,
            jobs.iter().map(|job| (job.id, job.status)),
            Utc::now(),
        );
        self.store.create_batch(&batch, jobs).await?;

        tracing::debug!(status = %batch.status, "Batch created");
        Ok(batch)
    }

    /// Recomputes the aggregate after a child changed state.
    ///
    /// The batch is read before its children so that a commit can only win
    /// against fresher child data if it lands first, in which case the
    /// fresher recomputation conflicts and runs again.
    #[instrument(skip(self), fields(batch_id = %batch_id))]
    pub async fn on_child_settled(&self, batch_id: BatchId) -> Result<Batch, StoreError> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let current = self
                .store
                .get_batch(batch_id)
                .await?
                .ok_or_else(|| StoreError::NotFound(batch_id.to_string()))?;

            let children = self.store.get_jobs(&current.job_ids).await?;
            let next = current.recompute(children.iter().map(|job| job.status), Utc::now());

            if next.status == current.status && next.counts == current.counts {
                return Ok(current);
            }

            match self
                .store
                .compare_and_set_batch(batch_id, current.version, &next)
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        status = %next.status,
                        succeeded = next.counts.succeeded,
                        failed = next.counts.failed,
                        pending = next.counts.pending,
                        attempts,
                        "Batch aggregate updated"
                    );
                    return Ok(next);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(attempts, "Batch version moved, recomputing");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
