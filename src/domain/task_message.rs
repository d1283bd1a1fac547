use serde::{Deserialize, Serialize};

use super::{ConversionOptions, DocumentRef, Job, JobId};

/// Unit of work carried by the broker channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub job_id: JobId,
    pub filename: String,
    pub document: DocumentRef,
    pub options: ConversionOptions,
    /// The job's retry count when this message was published. A message whose
    /// attempt no longer matches the job is stale and is dropped.
    pub attempt: u32,
}

impl TaskMessage {
    /// Returns `None` for jobs with no staged document.
    pub fn for_job(job: &Job) -> Option<Self> {
        let document = job.input.document.clone()?;
        Some(Self {
            job_id: job.id,
            filename: job.input.filename.clone(),
            document,
            options: job.input.options,
            attempt: job.retry_count,
        })
    }
}
