use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BatchId, ConversionOptions, ConversionResult, InputFormat, JobId, JobStatus, StoragePath};

/// Lifecycle record of one document's conversion.
///
/// Records are never mutated in place by callers: every transition method
/// returns the next record, which is then committed through the status
/// store's compare-and-set with `self.status` as the expected status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub batch_id: Option<BatchId>,
    pub status: JobStatus,
    pub input: JobInput,
    pub result: Option<ConversionResult>,
    pub error: Option<JobError>,
    /// Error of the most recent failed attempt while retries remain.
    pub last_error: Option<JobError>,
    pub retry_count: u32,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInput {
    pub filename: String,
    pub size_bytes: u64,
    /// Absent when the document was rejected before staging.
    pub document: Option<DocumentRef>,
    pub options: ConversionOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub storage_path: StoragePath,
    pub format: InputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobErrorKind {
    #[serde(rename = "validation_error")]
    Validation,
    #[serde(rename = "dispatch_error")]
    Dispatch,
    #[serde(rename = "conversion_error")]
    Conversion,
    #[serde(rename = "timeout_error")]
    Timeout,
}

impl JobError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid job transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

impl Job {
    pub fn new(id: JobId, batch_id: Option<BatchId>, input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            id,
            batch_id,
            status: JobStatus::Pending,
            input,
            result: None,
            error: None,
            last_error: None,
            retry_count: 0,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// A job whose document failed validation. It is created terminal and
    /// never dispatched.
    pub fn rejected(id: JobId, batch_id: Option<BatchId>, input: JobInput, message: String) -> Self {
        let mut job = Self::new(id, batch_id, input);
        job.status = JobStatus::Failed;
        job.error = Some(JobError::new(JobErrorKind::Validation, message));
        job.completed_at = Some(job.submitted_at);
        job
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&self, to: JobStatus, now: DateTime<Utc>) -> Result<Job, InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        let mut next = self.clone();
        next.status = to;
        next.updated_at = now;
        Ok(next)
    }

    /// `pending -> running`, claimed by a worker.
    pub fn begin(&self, now: DateTime<Utc>) -> Result<Job, InvalidTransition> {
        let mut next = self.transition(JobStatus::Running, now)?;
        next.started_at = Some(now);
        Ok(next)
    }

    /// `running -> succeeded`.
    pub fn succeed(
        &self,
        result: ConversionResult,
        now: DateTime<Utc>,
    ) -> Result<Job, InvalidTransition> {
        let mut next = self.transition(JobStatus::Succeeded, now)?;
        next.result = Some(result);
        next.error = None;
        next.completed_at = Some(now);
        Ok(next)
    }

    /// Records a failed attempt. The retry counter is incremented; while it
    /// stays below `max_retries` the job goes back to `pending`, otherwise it
    /// fails terminally with `error`.
    pub fn record_failure(
        &self,
        error: JobError,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Result<Job, InvalidTransition> {
        if self.status != JobStatus::Running {
            return Err(InvalidTransition {
                from: self.status,
                to: JobStatus::Failed,
            });
        }

        let retry_count = self.retry_count.saturating_add(1);
        let mut next = if retry_count < max_retries {
            let mut next = self.transition(JobStatus::Pending, now)?;
            next.last_error = Some(error);
            next
        } else {
            let mut next = self.transition(JobStatus::Failed, now)?;
            next.error = Some(error);
            next.completed_at = Some(now);
            next
        };
        next.retry_count = retry_count;
        Ok(next)
    }

    /// `pending -> failed` when no task could be published for the job.
    pub fn dispatch_failed(
        &self,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Job, InvalidTransition> {
        if self.status != JobStatus::Pending {
            return Err(InvalidTransition {
                from: self.status,
                to: JobStatus::Failed,
            });
        }
        let mut next = self.transition(JobStatus::Failed, now)?;
        next.error = Some(JobError::new(JobErrorKind::Dispatch, message));
        next.completed_at = Some(now);
        Ok(next)
    }

    /// Stays `pending` with a fresh `updated_at`, marking that its task was
    /// published again.
    pub fn requeued(&self, now: DateTime<Utc>) -> Result<Job, InvalidTransition> {
        if self.status != JobStatus::Pending {
            return Err(InvalidTransition {
                from: self.status,
                to: JobStatus::Pending,
            });
        }
        let mut next = self.clone();
        next.updated_at = now;
        Ok(next)
    }

    /// `failed -> pending` on an explicit client retry. The retry budget is
    /// reset and previous outcome cleared.
    pub fn resubmit(&self, now: DateTime<Utc>) -> Result<Job, InvalidTransition> {
        if self.status != JobStatus::Failed {
            return Err(InvalidTransition {
                from: self.status,
                to: JobStatus::Pending,
            });
        }
        let mut next = self.transition(JobStatus::Pending, now)?;
        next.last_error = next.error.take();
        next.result = None;
        next.retry_count = 0;
        next.started_at = None;
        next.completed_at = None;
        Ok(next)
    }
}
