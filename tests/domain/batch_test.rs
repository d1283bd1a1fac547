use chrono::Utc;
use proptest::prelude::*;

use docconv::domain::{Batch, BatchCounts, BatchId, BatchStatus, JobId, JobStatus};

fn counts(total: usize, succeeded: usize, failed: usize) -> BatchCounts {
    BatchCounts {
        total,
        succeeded,
        failed,
        pending: total - succeeded - failed,
    }
}

#[test]
fn given_child_counts_when_aggregated_then_status_follows_rules() {
    let cases = [
        (counts(0, 0, 0), BatchStatus::Pending),
        (counts(3, 0, 0), BatchStatus::Pending),
        (counts(3, 2, 0), BatchStatus::Pending),
        (counts(3, 1, 1), BatchStatus::Partial),
        (counts(3, 0, 1), BatchStatus::Partial),
        (counts(3, 3, 0), BatchStatus::Succeeded),
        (counts(3, 0, 3), BatchStatus::Failed),
        (counts(3, 2, 1), BatchStatus::Partial),
    ];

    for (counts, expected) in cases {
        assert_eq!(BatchStatus::aggregate(&counts), expected, "{counts:?}");
    }
}

#[test]
fn given_statuses_when_tallied_then_running_counts_as_pending() {
    let counts = BatchCounts::tally([
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Succeeded,
        JobStatus::Failed,
    ]);

    assert_eq!(counts, BatchCounts { total: 4, succeeded: 1, failed: 1, pending: 2 });
}

#[test]
fn given_new_batch_with_rejected_child_when_created_then_is_partial_and_unfinished() {
    let batch = Batch::new(
        BatchId::new(),
        [
            (JobId::new(), JobStatus::Pending),
            (JobId::new(), JobStatus::Failed),
        ],
        Utc::now(),
    );

    assert_eq!(batch.status, BatchStatus::Partial);
    assert_eq!(batch.version, 0);
    assert!(!batch.is_finished());
}

#[test]
fn given_new_batch_with_only_rejected_children_when_created_then_is_failed_and_finished() {
    let batch = Batch::new(
        BatchId::new(),
        [(JobId::new(), JobStatus::Failed)],
        Utc::now(),
    );

    assert_eq!(batch.status, BatchStatus::Failed);
    assert!(batch.is_finished());
}

#[test]
fn given_batch_when_recomputed_then_version_increments_and_completion_is_stamped_once() {
    let ids = [JobId::new(), JobId::new()];
    let created = Utc::now();
    let batch = Batch::new(
        BatchId::new(),
        ids.iter().map(|id| (*id, JobStatus::Pending)),
        created,
    );

    let first = batch.recompute([JobStatus::Succeeded, JobStatus::Succeeded], Utc::now());
    assert_eq!(first.version, 1);
    assert_eq!(first.status, BatchStatus::Succeeded);
    let completed_at = first.completed_at.expect("finished batch has completion time");

    let second = first.recompute([JobStatus::Succeeded, JobStatus::Succeeded], Utc::now());
    assert_eq!(second.version, 2);
    assert_eq!(second.completed_at, Some(completed_at));
    assert_eq!(second.created_at, created);
    assert_eq!(second.job_ids, ids.to_vec());
}

#[test]
fn given_finished_batch_when_child_retried_then_completion_is_cleared() {
    let batch = Batch::new(
        BatchId::new(),
        [(JobId::new(), JobStatus::Failed)],
        Utc::now(),
    );

    let reopened = batch.recompute([JobStatus::Pending], Utc::now());

    assert_eq!(reopened.status, BatchStatus::Pending);
    assert!(reopened.completed_at.is_none());
}

fn settle_in_order(outcomes: &[bool]) -> (BatchStatus, Vec<BatchStatus>) {
    let now = Utc::now();
    let mut statuses = vec![JobStatus::Pending; outcomes.len()];
    let mut batch = Batch::new(
        BatchId::new(),
        statuses.iter().map(|status| (JobId::new(), *status)),
        now,
    );
    let mut history = vec![batch.status];

    for (index, succeeded) in outcomes.iter().enumerate() {
        statuses[index] = if *succeeded {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
        batch = batch.recompute(statuses.iter().copied(), now);
        history.push(batch.status);
    }
    (batch.status, history)
}

proptest! {
    #[test]
    fn given_any_completion_order_when_all_children_settle_then_final_status_is_the_same(
        (outcomes, shuffled) in prop::collection::vec(any::<bool>(), 1..12)
            .prop_flat_map(|outcomes| (Just(outcomes.clone()), Just(outcomes).prop_shuffle()))
    ) {
        let (in_order, _) = settle_in_order(&outcomes);
        let (reordered, _) = settle_in_order(&shuffled);
        prop_assert_eq!(in_order, reordered);
    }

    #[test]
    fn given_any_completion_order_when_a_child_fails_then_batch_never_returns_to_pending(
        outcomes in prop::collection::vec(any::<bool>(), 1..12)
    ) {
        let (_, history) = settle_in_order(&outcomes);
        let first_failure = history
            .iter()
            .position(|status| matches!(status, BatchStatus::Partial | BatchStatus::Failed));
        if let Some(position) = first_failure {
            prop_assert!(history[position..].iter().all(|status| *status != BatchStatus::Pending));
        }
    }
}
