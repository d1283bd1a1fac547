//! Behaviour every `JobStatusStore` implementation must share.

use chrono::{Duration, Utc};

use docconv::application::ports::{CompletedJobRef, JobStatusStore, StoreError};
use docconv::domain::{
    Batch, BatchId, BatchStatus, ConversionOptions, ConversionResult, DocumentRef, InputFormat,
    Job, JobId, JobInput, JobStatus, StoragePath,
};

pub fn pending_job(filename: &str, batch_id: Option<BatchId>) -> Job {
    let id = JobId::new();
    Job::new(
        id,
        batch_id,
        JobInput {
            filename: filename.to_string(),
            size_bytes: 12,
            document: Some(DocumentRef {
                storage_path: StoragePath::new(&id, filename),
                format: InputFormat::Md,
            }),
            options: ConversionOptions::default(),
        },
    )
}

fn batch_of(names: &[&str]) -> (Batch, Vec<Job>) {
    let batch_id = BatchId::new();
    let jobs: Vec<Job> = names
        .iter()
        .map(|name| pending_job(name, Some(batch_id)))
        .collect();
    let batch = Batch::new(
        batch_id,
        jobs.iter().map(|job| (job.id, job.status)),
        Utc::now(),
    );
    (batch, jobs)
}

pub async fn created_job_is_readable(store: &dyn JobStatusStore) {
    let job = pending_job("report.md", None);

    store.create_job(&job).await.unwrap();

    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.id, job.id);
    assert_eq!(stored.status, JobStatus::Pending);
    assert_eq!(stored.input, job.input);
    assert!(store.get_job(JobId::new()).await.unwrap().is_none());
}

pub async fn duplicate_job_is_rejected(store: &dyn JobStatusStore) {
    let job = pending_job("twice.md", None);
    store.create_job(&job).await.unwrap();

    let result = store.create_job(&job).await;

    assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
}

pub async fn job_cas_applies_only_on_expected_status(store: &dyn JobStatusStore) {
    let job = pending_job("cas.md", None);
    store.create_job(&job).await.unwrap();
    let running = job.begin(Utc::now()).unwrap();

    store
        .compare_and_set_job(job.id, JobStatus::Pending, &running)
        .await
        .unwrap();
    let second = store
        .compare_and_set_job(job.id, JobStatus::Pending, &running)
        .await;

    assert!(second.as_ref().is_err_and(StoreError::is_conflict));
    assert_eq!(
        store.get_job(job.id).await.unwrap().unwrap().status,
        JobStatus::Running
    );

    let succeeded = running
        .succeed(
            ConversionResult {
                filename: "cas.md".to_string(),
                markdown: "# cas".to_string(),
                images: Vec::new(),
            },
            Utc::now(),
        )
        .unwrap();
    store
        .compare_and_set_job(job.id, JobStatus::Running, &succeeded)
        .await
        .unwrap();
    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Succeeded);
    assert_eq!(stored.result.map(|r| r.markdown), Some("# cas".to_string()));
}

pub async fn job_cas_on_missing_record_is_not_found(store: &dyn JobStatusStore) {
    let job = pending_job("ghost.md", None);

    let result = store
        .compare_and_set_job(job.id, JobStatus::Pending, &job)
        .await;

    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

pub async fn batch_is_created_with_children(store: &dyn JobStatusStore) {
    let (batch, jobs) = batch_of(&["a.md", "b.md", "c.md"]);

    store.create_batch(&batch, &jobs).await.unwrap();

    let stored = store.get_batch(batch.id).await.unwrap().unwrap();
    assert_eq!(stored.job_ids, batch.job_ids);
    assert_eq!(stored.status, BatchStatus::Pending);
    assert_eq!(stored.counts.total, 3);

    let reversed: Vec<JobId> = batch.job_ids.iter().rev().copied().collect();
    let children = store.get_jobs(&reversed).await.unwrap();
    let order: Vec<JobId> = children.iter().map(|job| job.id).collect();
    assert_eq!(order, reversed);
    assert!(children.iter().all(|job| job.batch_id == Some(batch.id)));
}

pub async fn batch_cas_applies_only_on_expected_version(store: &dyn JobStatusStore) {
    let (batch, jobs) = batch_of(&["a.md"]);
    store.create_batch(&batch, &jobs).await.unwrap();
    let next = batch.recompute([JobStatus::Succeeded], Utc::now());

    store
        .compare_and_set_batch(batch.id, 0, &next)
        .await
        .unwrap();
    let stale = store.compare_and_set_batch(batch.id, 0, &next).await;

    assert!(stale.as_ref().is_err_and(StoreError::is_conflict));
    let stored = store.get_batch(batch.id).await.unwrap().unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.status, BatchStatus::Succeeded);
    assert!(stored.completed_at.is_some());
}

pub async fn jobs_are_listed_by_status(store: &dyn JobStatusStore) {
    let waiting = pending_job("waiting.md", None);
    let claimed = pending_job("claimed.md", None);
    store.create_job(&waiting).await.unwrap();
    store.create_job(&claimed).await.unwrap();
    store
        .compare_and_set_job(
            claimed.id,
            JobStatus::Pending,
            &claimed.begin(Utc::now()).unwrap(),
        )
        .await
        .unwrap();

    let running = store.list_jobs_by_status(JobStatus::Running).await.unwrap();
    let pending = store.list_jobs_by_status(JobStatus::Pending).await.unwrap();

    assert!(running.iter().any(|job| job.id == claimed.id));
    assert!(!running.iter().any(|job| job.id == waiting.id));
    assert!(pending.iter().any(|job| job.id == waiting.id));
}

pub async fn finished_batches_are_listed_by_completion(store: &dyn JobStatusStore) {
    let (open, open_jobs) = batch_of(&["open.md"]);
    let (done, done_jobs) = batch_of(&["done.md"]);
    store.create_batch(&open, &open_jobs).await.unwrap();
    store.create_batch(&done, &done_jobs).await.unwrap();
    let finished = done.recompute([JobStatus::Failed], Utc::now());
    store
        .compare_and_set_batch(done.id, 0, &finished)
        .await
        .unwrap();

    let later = store
        .list_batches_completed_before(Utc::now() + Duration::minutes(1))
        .await
        .unwrap();
    let earlier = store
        .list_batches_completed_before(Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    assert!(later.contains(&done.id));
    assert!(!later.contains(&open.id));
    assert!(!earlier.contains(&done.id));
}

async fn finish(store: &dyn JobStatusStore, job: &Job) -> Job {
    let running = job.begin(Utc::now()).unwrap();
    store
        .compare_and_set_job(job.id, JobStatus::Pending, &running)
        .await
        .unwrap();
    let done = running
        .succeed(
            ConversionResult {
                filename: job.input.filename.clone(),
                markdown: "# done".to_string(),
                images: Vec::new(),
            },
            Utc::now(),
        )
        .unwrap();
    store
        .compare_and_set_job(job.id, JobStatus::Running, &done)
        .await
        .unwrap();
    done
}

pub async fn finished_standalone_jobs_are_listed_with_staged_paths(store: &dyn JobStatusStore) {
    let done = pending_job("done.md", None);
    let waiting = pending_job("waiting.md", None);
    let rejected = Job::rejected(
        JobId::new(),
        None,
        JobInput {
            filename: "empty.md".to_string(),
            size_bytes: 0,
            document: None,
            options: ConversionOptions::default(),
        },
        "document is empty".to_string(),
    );
    let (batch, children) = batch_of(&["child.md"]);
    store.create_job(&done).await.unwrap();
    store.create_job(&waiting).await.unwrap();
    store.create_job(&rejected).await.unwrap();
    store.create_batch(&batch, &children).await.unwrap();
    finish(store, &done).await;
    finish(store, &children[0]).await;

    let later = store
        .list_standalone_jobs_completed_before(Utc::now() + Duration::minutes(1))
        .await
        .unwrap();
    let earlier = store
        .list_standalone_jobs_completed_before(Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    assert!(later.contains(&CompletedJobRef {
        id: done.id,
        storage_path: Some(StoragePath::new(&done.id, "done.md")),
    }));
    assert!(later.contains(&CompletedJobRef {
        id: rejected.id,
        storage_path: None,
    }));
    assert!(!later.iter().any(|job| job.id == waiting.id));
    assert!(!later.iter().any(|job| job.id == children[0].id));
    assert!(!earlier.iter().any(|job| job.id == done.id));
}

pub async fn expiring_batch_removes_children(store: &dyn JobStatusStore) {
    let (batch, jobs) = batch_of(&["a.md", "b.md"]);
    let standalone = pending_job("solo.md", None);
    store.create_batch(&batch, &jobs).await.unwrap();
    store.create_job(&standalone).await.unwrap();

    store.expire_batch(batch.id).await.unwrap();
    store.expire_job(standalone.id).await.unwrap();

    assert!(store.get_batch(batch.id).await.unwrap().is_none());
    assert!(store.get_jobs(&batch.job_ids).await.unwrap().is_empty());
    assert!(store.get_job(standalone.id).await.unwrap().is_none());
    store.expire_job(standalone.id).await.unwrap();
}
