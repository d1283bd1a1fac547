use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Batch, BatchId, Job, JobId, JobStatus, StoragePath};

use super::StoreError;

/// Identity of a finished job and its staged blob, without the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJobRef {
    pub id: JobId,
    pub storage_path: Option<StoragePath>,
}

/// Shared store of job and batch records.
///
/// Every status change goes through a compare-and-set: jobs are guarded by
/// their current status, batches by their version.
#[async_trait]
pub trait JobStatusStore: Send + Sync {
    /// Fails with [`StoreError::AlreadyExists`] on id collision.
    async fn create_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Creates a batch together with all of its children, or nothing.
    async fn create_batch(&self, batch: &Batch, jobs: &[Job]) -> Result<(), StoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Returns the jobs that still exist, in the order requested.
    async fn get_jobs(&self, ids: &[JobId]) -> Result<Vec<Job>, StoreError>;

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError>;

    /// Replaces the job record if its current status is `expected`.
    async fn compare_and_set_job(
        &self,
        id: JobId,
        expected: JobStatus,
        job: &Job,
    ) -> Result<(), StoreError>;

    /// Replaces the batch record if its current version is `expected_version`.
    async fn compare_and_set_batch(
        &self,
        id: BatchId,
        expected_version: u64,
        batch: &Batch,
    ) -> Result<(), StoreError>;

    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;

    async fn list_batches_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BatchId>, StoreError>;

    /// Terminal jobs outside any batch that completed before `cutoff`.
    async fn list_standalone_jobs_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CompletedJobRef>, StoreError>;

    async fn expire_job(&self, id: JobId) -> Result<(), StoreError>;

    /// Removes the batch and all of its children.
    async fn expire_batch(&self, id: BatchId) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
