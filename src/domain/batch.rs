use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BatchId, JobId, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Partial,
    Succeeded,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Partial => "partial",
            BatchStatus::Succeeded => "succeeded",
            BatchStatus::Failed => "failed",
        }
    }

    /// Aggregate status of a batch from its child counts.
    ///
    /// While any child is still in flight the batch is `pending` until a
    /// child fails, after which it is `partial`. Once every child is terminal
    /// it is `succeeded` or `failed` when they agree and `partial` otherwise.
    /// An empty batch is `pending`.
    pub fn aggregate(counts: &BatchCounts) -> Self {
        let BatchCounts {
            total,
            succeeded,
            failed,
            pending,
        } = *counts;

        if total == 0 {
            return BatchStatus::Pending;
        }
        if pending > 0 {
            return if failed == 0 {
                BatchStatus::Pending
            } else {
                BatchStatus::Partial
            };
        }
        if succeeded == total {
            BatchStatus::Succeeded
        } else if failed == total {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BatchStatus::Pending),
            "partial" => Ok(BatchStatus::Partial),
            "succeeded" => Ok(BatchStatus::Succeeded),
            "failed" => Ok(BatchStatus::Failed),
            _ => Err(format!("Invalid batch status: {}", s)),
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
}

impl BatchCounts {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = JobStatus>,
    {
        statuses
            .into_iter()
            .fold(BatchCounts::default(), |mut counts, status| {
                counts.total += 1;
                match status {
                    JobStatus::Succeeded => counts.succeeded += 1,
                    JobStatus::Failed => counts.failed += 1,
                    JobStatus::Pending | JobStatus::Running => counts.pending += 1,
                }
                counts
            })
    }
}

/// A group of jobs submitted together.
///
/// `version` is the optimistic concurrency token: every committed
/// recomputation increments it by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub job_ids: Vec<JobId>,
    pub status: BatchStatus,
    pub counts: BatchCounts,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set while no child is in flight.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new<I>(id: BatchId, children: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = (JobId, JobStatus)>,
    {
        let (job_ids, statuses): (Vec<JobId>, Vec<JobStatus>) = children.into_iter().unzip();
        let counts = BatchCounts::tally(statuses);
        Self {
            id,
            job_ids,
            status: BatchStatus::aggregate(&counts),
            counts,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: (counts.total > 0 && counts.pending == 0).then_some(now),
        }
    }

    /// Next version of this batch given the current child statuses.
    pub fn recompute<I>(&self, statuses: I, now: DateTime<Utc>) -> Batch
    where
        I: IntoIterator<Item = JobStatus>,
    {
        let counts = BatchCounts::tally(statuses);
        let finished = counts.total > 0 && counts.pending == 0;
        Batch {
            id: self.id,
            job_ids: self.job_ids.clone(),
            status: BatchStatus::aggregate(&counts),
            counts,
            version: self.version + 1,
            created_at: self.created_at,
            updated_at: now,
            completed_at: if finished {
                self.completed_at.or(Some(now))
            } else {
                None
            },
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }
}
