use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::application::ports::{CompletedJobRef, JobStatusStore, StoreError};
use crate::domain::{Batch, BatchId, Job, JobId, JobStatus};

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, Job>,
    batches: HashMap<BatchId, Batch>,
}

/// Process-local status store for single-node deployments and tests.
#[derive(Default)]
pub struct InMemoryJobStatusStore {
    state: RwLock<State>,
}

impl InMemoryJobStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStatusStore for InMemoryJobStatusStore {
    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id.to_string()));
        }
        state.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn create_batch(&self, batch: &Batch, jobs: &[Job]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.batches.contains_key(&batch.id) {
            return Err(StoreError::AlreadyExists(batch.id.to_string()));
        }
        if let Some(existing) = jobs.iter().find(|job| state.jobs.contains_key(&job.id)) {
            return Err(StoreError::AlreadyExists(existing.id.to_string()));
        }

        state.batches.insert(batch.id, batch.clone());
        for job in jobs {
            state.jobs.insert(job.id, job.clone());
        }
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.state.read().await.jobs.get(&id).cloned())
    }

    async fn get_jobs(&self, ids: &[JobId]) -> Result<Vec<Job>, StoreError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.jobs.get(id).cloned()).collect())
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        Ok(self.state.read().await.batches.get(&id).cloned())
    }

    async fn compare_and_set_job(
        &self,
        id: JobId,
        expected: JobStatus,
        job: &Job,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let current = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if current.status != expected {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected.to_string(),
                actual: current.status.to_string(),
            });
        }
        *current = job.clone();
        Ok(())
    }

    async fn compare_and_set_batch(
        &self,
        id: BatchId,
        expected_version: u64,
        batch: &Batch,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let current = state
            .batches
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if current.version != expected_version {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected_version.to_string(),
                actual: current.version.to_string(),
            });
        }
        *current = batch.clone();
        Ok(())
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let state = self.state.read().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.submitted_at);
        Ok(jobs)
    }

    async fn list_batches_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BatchId>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .batches
            .values()
            .filter(|batch| batch.completed_at.is_some_and(|completed| completed < cutoff))
            .map(|batch| batch.id)
            .collect())
    }

    async fn list_standalone_jobs_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CompletedJobRef>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .values()
            .filter(|job| job.batch_id.is_none())
            .filter(|job| job.completed_at.is_some_and(|completed| completed < cutoff))
            .map(|job| CompletedJobRef {
                id: job.id,
                storage_path: job
                    .input
                    .document
                    .as_ref()
                    .map(|document| document.storage_path.clone()),
            })
            .collect())
    }

    async fn expire_job(&self, id: JobId) -> Result<(), StoreError> {
        self.state.write().await.jobs.remove(&id);
        Ok(())
    }

    async fn expire_batch(&self, id: BatchId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(batch) = state.batches.remove(&id) {
            for job_id in &batch.job_ids {
                state.jobs.remove(job_id);
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

