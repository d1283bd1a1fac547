use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::instrument;

use crate::application::ports::{
    BrokerChannel, ConverterError, DocumentFetcher, JobStatusStore, StagingStore, StoreError,
};
use crate::domain::{
    Batch, BatchId, ConversionOptions, ConversionResult, DocumentRef, Job, JobId, JobInput,
    JobStatus, StoragePath, TaskMessage,
};

use super::{BatchOrchestrator, ConversionRunner, DocumentValidator, Upload, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("dispatch failed: {0}")]
    Dispatch(String),
    #[error("conversion: {0}")]
    Conversion(#[from] ConverterError),
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("batch not found: {0}")]
    BatchNotFound(BatchId),
    #[error("job {job_id} is {status} and cannot be retried")]
    NotRetryable { job_id: JobId, status: JobStatus },
    #[error("status store: {0}")]
    Store(#[from] StoreError),
}

/// A batch record together with its children, in submission order.
#[derive(Debug, Clone)]
pub struct BatchView {
    pub batch: Batch,
    pub jobs: Vec<Job>,
}

/// Per-document outcome of a synchronous batch conversion.
#[derive(Debug)]
pub struct SyncOutcome {
    pub filename: String,
    pub outcome: Result<ConversionResult, GatewayError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub store: bool,
    pub broker: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.store && self.broker
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GatewayLimits {
    pub max_batch_documents: usize,
    pub sync_concurrency: usize,
}

/// Entry point for every client request.
pub struct ConversionGateway {
    store: Arc<dyn JobStatusStore>,
    broker: Arc<dyn BrokerChannel>,
    staging: Arc<dyn StagingStore>,
    fetcher: Arc<dyn DocumentFetcher>,
    orchestrator: Arc<BatchOrchestrator>,
    runner: ConversionRunner,
    validator: DocumentValidator,
    sync_permits: Semaphore,
    max_batch_documents: usize,
}

impl ConversionGateway {
    pub fn new(
        store: Arc<dyn JobStatusStore>,
        broker: Arc<dyn BrokerChannel>,
        staging: Arc<dyn StagingStore>,
        fetcher: Arc<dyn DocumentFetcher>,
        orchestrator: Arc<BatchOrchestrator>,
        runner: ConversionRunner,
        validator: DocumentValidator,
        limits: GatewayLimits,
    ) -> Self {
        Self {
            store,
            broker,
            staging,
            fetcher,
            orchestrator,
            runner,
            validator,
            sync_permits: Semaphore::new(limits.sync_concurrency.max(1)),
            max_batch_documents: limits.max_batch_documents,
        }
    }

    /// Downloads documents submitted by URL, keeping their order. The
    /// results go through the same validation and staging as uploads.
    #[instrument(skip(self, urls), fields(urls = urls.len()))]
    pub async fn fetch_documents(&self, urls: &[String]) -> Result<Vec<Upload>, GatewayError> {
        if urls.len() > self.max_batch_documents {
            return Err(ValidationError::TooManyDocuments {
                count: urls.len(),
                limit: self.max_batch_documents,
            }
            .into());
        }

        join_all(urls.iter().map(|url| self.fetcher.fetch(url)))
            .await
            .into_iter()
            .map(|fetched| {
                fetched
                    .map(Upload::from)
                    .map_err(|e| GatewayError::Validation(e.into()))
            })
            .collect()
    }

    /// Converts one document inline. No job record is created.
    #[instrument(skip(self, upload), fields(filename = %upload.filename))]
    pub async fn submit_sync(
        &self,
        upload: Upload,
        options: ConversionOptions,
    ) -> Result<ConversionResult, GatewayError> {
        options.validate().map_err(ValidationError::from)?;
        let document = self.validator.validate(upload)?;

        let _permit = self
            .sync_permits
            .acquire()
            .await
            .map_err(|e| GatewayError::Dispatch(e.to_string()))?;

        let result = self.runner.run(&document, &options).await?;
        tracing::info!(format = document.format.as_str(), "Synchronous conversion completed");
        Ok(result)
    }

    /// Converts several documents inline, concurrently up to the sync
    /// permit limit. Outcomes keep upload order and a failing document only
    /// affects its own outcome.
    #[instrument(skip(self, uploads), fields(documents = uploads.len()))]
    pub async fn submit_batch_sync(
        &self,
        uploads: Vec<Upload>,
        options: ConversionOptions,
    ) -> Result<Vec<SyncOutcome>, GatewayError> {
        options.validate().map_err(ValidationError::from)?;
        self.check_batch_size(uploads.len())?;

        let outcomes = join_all(uploads.into_iter().map(|upload| async move {
            let filename = upload.filename.clone();
            let outcome = self.submit_sync(upload, options).await;
            SyncOutcome { filename, outcome }
        }))
        .await;
        Ok(outcomes)
    }

    /// Stages the document, records a `pending` job and publishes its task.
    #[instrument(skip(self, upload), fields(filename = %upload.filename))]
    pub async fn submit_async(
        &self,
        upload: Upload,
        options: ConversionOptions,
    ) -> Result<JobId, GatewayError> {
        options.validate().map_err(ValidationError::from)?;
        let document = self.validator.validate(upload)?;

        let job_id = JobId::new();
        let storage_path = StoragePath::new(&job_id, &document.filename);
        self.staging
            .store(&storage_path, document.data.clone())
            .await
            .map_err(|e| GatewayError::Dispatch(format!("staging failed: {e}")))?;

        let job = Job::new(
            job_id,
            None,
            JobInput {
                filename: document.filename.clone(),
                size_bytes: document.size_bytes(),
                document: Some(DocumentRef {
                    storage_path: storage_path.clone(),
                    format: document.format,
                }),
                options,
            },
        );

        if let Err(e) = self.store.create_job(&job).await {
            tracing::error!(error = %e, "Failed to create job record");
            self.discard_blob(&storage_path).await;
            return Err(GatewayError::Dispatch(format!("job record not created: {e}")));
        }

        self.dispatch(&job).await?;

        tracing::info!(job_id = %job_id, format = document.format.as_str(), "Conversion job enqueued");
        Ok(job_id)
    }

    /// Creates a batch with one child job per document and publishes a task
    /// for every valid child. Invalid documents become failed children.
    #[instrument(skip(self, uploads), fields(documents = uploads.len()))]
    pub async fn submit_batch_async(
        &self,
        uploads: Vec<Upload>,
        options: ConversionOptions,
    ) -> Result<BatchId, GatewayError> {
        options.validate().map_err(ValidationError::from)?;
        self.check_batch_size(uploads.len())?;

        let batch_id = BatchId::new();
        let mut jobs = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let job_id = JobId::new();
            let filename = upload.filename.clone();
            let size_bytes = upload.size_bytes;

            let job = match self.validator.validate(upload) {
                Ok(document) => {
                    let storage_path = StoragePath::new(&job_id, &document.filename);
                    let input = JobInput {
                        filename,
                        size_bytes,
                        document: Some(DocumentRef {
                            storage_path: storage_path.clone(),
                            format: document.format,
                        }),
                        options,
                    };
                    match self.staging.store(&storage_path, document.data).await {
                        Ok(_) => Job::new(job_id, Some(batch_id), input),
                        Err(e) => {
                            tracing::warn!(job_id = %job_id, error = %e, "Staging failed for batch document");
                            let pending = Job::new(job_id, Some(batch_id), input);
                            pending
                                .dispatch_failed(format!("staging failed: {e}"), Utc::now())
                                .unwrap_or(pending)
                        }
                    }
                }
                Err(e) => {
                    tracing::info!(job_id = %job_id, error = %e, "Batch document rejected");
                    let input = JobInput {
                        filename,
                        size_bytes,
                        document: None,
                        options,
                    };
                    Job::rejected(job_id, Some(batch_id), input, e.to_string())
                }
            };
            jobs.push(job);
        }

        if let Err(e) = self.orchestrator.create_batch(batch_id, &jobs).await {
            tracing::error!(error = %e, "Failed to create batch record");
            for job in &jobs {
                if let Some(document) = &job.input.document {
                    self.discard_blob(&document.storage_path).await;
                }
            }
            return Err(GatewayError::Dispatch(format!("batch record not created: {e}")));
        }

        let mut dispatched = 0usize;
        let mut undispatched = 0usize;
        for job in jobs.iter().filter(|job| job.status == JobStatus::Pending) {
            match self.dispatch(job).await {
                Ok(()) => dispatched += 1,
                Err(_) => undispatched += 1,
            }
        }

        if undispatched > 0 {
            if let Err(e) = self.orchestrator.on_child_settled(batch_id).await {
                tracing::error!(error = %e, "Failed to refresh batch after dispatch failures");
            }
            if dispatched == 0 {
                return Err(GatewayError::Dispatch(format!(
                    "no task of batch {batch_id} could be published"
                )));
            }
        }

        tracing::info!(batch_id = %batch_id, dispatched, undispatched, "Batch conversion enqueued");
        Ok(batch_id)
    }

    pub async fn get_job_status(&self, job_id: JobId) -> Result<Job, GatewayError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or(GatewayError::JobNotFound(job_id))
    }

    pub async fn get_batch_status(&self, batch_id: BatchId) -> Result<BatchView, GatewayError> {
        let batch = self
            .store
            .get_batch(batch_id)
            .await?
            .ok_or(GatewayError::BatchNotFound(batch_id))?;
        let jobs = self.store.get_jobs(&batch.job_ids).await?;
        Ok(BatchView { batch, jobs })
    }

    /// Moves a failed job back to `pending` with a fresh retry budget and
    /// publishes a new task for it.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn retry_job(&self, job_id: JobId) -> Result<Job, GatewayError> {
        let job = self.get_job_status(job_id).await?;

        if job.input.document.is_none() {
            return Err(GatewayError::NotRetryable {
                job_id,
                status: job.status,
            });
        }
        let resubmitted = job
            .resubmit(Utc::now())
            .map_err(|_| GatewayError::NotRetryable {
                job_id,
                status: job.status,
            })?;

        match self
            .store
            .compare_and_set_job(job_id, JobStatus::Failed, &resubmitted)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                let current = self.get_job_status(job_id).await?;
                return Err(GatewayError::NotRetryable {
                    job_id,
                    status: current.status,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let outcome = self.dispatch(&resubmitted).await;
        if let Some(batch_id) = resubmitted.batch_id {
            if let Err(e) = self.orchestrator.on_child_settled(batch_id).await {
                tracing::error!(batch_id = %batch_id, error = %e, "Failed to refresh batch after retry");
            }
        }
        outcome?;

        tracing::info!("Failed job resubmitted");
        Ok(resubmitted)
    }

    pub async fn health(&self) -> HealthReport {
        let store = match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Status store health check failed");
                false
            }
        };
        let broker = match self.broker.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Broker health check failed");
                false
            }
        };
        HealthReport { store, broker }
    }

    fn check_batch_size(&self, count: usize) -> Result<(), ValidationError> {
        if count == 0 {
            return Err(ValidationError::NoDocuments);
        }
        if count > self.max_batch_documents {
            return Err(ValidationError::TooManyDocuments {
                count,
                limit: self.max_batch_documents,
            });
        }
        Ok(())
    }

    /// Publishes the job's task. On failure the job is moved to `failed`
    /// with a dispatch error so it never waits for a task that does not exist.
    async fn dispatch(&self, job: &Job) -> Result<(), GatewayError> {
        let Some(task) = TaskMessage::for_job(job) else {
            return Err(GatewayError::Dispatch(format!(
                "job {} has no staged document",
                job.id
            )));
        };

        let Err(e) = self.broker.publish(&task, Duration::ZERO).await else {
            return Ok(());
        };

        tracing::warn!(job_id = %job.id, error = %e, "Task publication failed, failing job");
        match job.dispatch_failed(e.to_string(), Utc::now()) {
            Ok(failed) => {
                if let Err(store_err) = self
                    .store
                    .compare_and_set_job(job.id, JobStatus::Pending, &failed)
                    .await
                {
                    tracing::error!(
                        job_id = %job.id,
                        error = %store_err,
                        "Could not record dispatch failure"
                    );
                }
            }
            Err(transition) => {
                tracing::error!(job_id = %job.id, error = %transition, "Unexpected job state on dispatch");
            }
        }

        Err(GatewayError::Dispatch(e.to_string()))
    }

    async fn discard_blob(&self, path: &StoragePath) {
        if let Err(e) = self.staging.delete(path).await {
            tracing::warn!(error = %e, path = %path, "Failed to delete staged document");
        }
    }
}
