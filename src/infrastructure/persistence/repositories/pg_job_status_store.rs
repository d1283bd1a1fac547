use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{CompletedJobRef, JobStatusStore, StoreError};
use crate::domain::{Batch, BatchId, Job, JobId, JobStatus, StoragePath};

pub struct PgJobStatusStore {
    pool: PgPool,
}

impl PgJobStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_job_status(&self, id: JobId) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT status FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        row.map(|r| r.try_get::<String, _>("status").map_err(corrupt))
            .transpose()
    }
}

fn query_failed(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::AlreadyExists(db.message().to_string()),
        _ => StoreError::Unavailable(e.to_string()),
    }
}

fn corrupt(e: sqlx::Error) -> StoreError {
    StoreError::Corrupt(e.to_string())
}

fn decode_job(row: &sqlx::postgres::PgRow) -> Result<Job, StoreError> {
    row.try_get::<Json<Job>, _>("record")
        .map(|Json(job)| job)
        .map_err(corrupt)
}

fn decode_batch(row: &sqlx::postgres::PgRow) -> Result<Batch, StoreError> {
    row.try_get::<Json<Batch>, _>("record")
        .map(|Json(batch)| batch)
        .map_err(corrupt)
}

async fn insert_job<'e, E>(executor: E, job: &Job) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO jobs (id, batch_id, status, record, submitted_at, started_at, completed_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(job.id.as_uuid())
    .bind(job.batch_id.map(|id| id.as_uuid()))
    .bind(job.status.as_str())
    .bind(Json(job))
    .bind(job.submitted_at)
    .bind(job.started_at)
    .bind(job.completed_at)
    .bind(job.updated_at)
    .execute(executor)
    .await
    .map_err(query_failed)?;
    Ok(())
}

#[async_trait]
impl JobStatusStore for PgJobStatusStore {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        insert_job(&self.pool, job).await
    }

    #[instrument(skip(self, batch, jobs), fields(batch_id = %batch.id, jobs = jobs.len()))]
    async fn create_batch(&self, batch: &Batch, jobs: &[Job]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        sqlx::query(
            r#"
            INSERT INTO batches (id, version, status, record, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(batch.id.as_uuid())
        .bind(batch.version as i64)
        .bind(batch.status.as_str())
        .bind(Json(batch))
        .bind(batch.created_at)
        .bind(batch.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(query_failed)?;

        for job in jobs {
            insert_job(&mut *tx, job).await?;
        }

        tx.commit().await.map_err(query_failed)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query("SELECT record FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        row.as_ref().map(decode_job).transpose()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_jobs(&self, ids: &[JobId]) -> Result<Vec<Job>, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query("SELECT record FROM jobs WHERE id = ANY($1)")
            .bind(uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)?;

        let mut found = rows
            .iter()
            .map(decode_job)
            .map(|job| job.map(|job| (job.id, job)))
            .collect::<Result<std::collections::HashMap<_, _>, _>>()?;

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    #[instrument(skip(self), fields(batch_id = %id))]
    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        let row = sqlx::query("SELECT record FROM batches WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        row.as_ref().map(decode_batch).transpose()
    }

    #[instrument(skip(self, job), fields(job_id = %id, expected = %expected, next = %job.status))]
    async fn compare_and_set_job(
        &self,
        id: JobId,
        expected: JobStatus,
        job: &Job,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, record = $2, started_at = $3, completed_at = $4, updated_at = $5
            WHERE id = $6 AND status = $7
            "#,
        )
        .bind(job.status.as_str())
        .bind(Json(job))
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.updated_at)
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.current_job_status(id).await? {
            Some(actual) => Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected.to_string(),
                actual,
            }),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    #[instrument(skip(self, batch), fields(batch_id = %id))]
    async fn compare_and_set_batch(
        &self,
        id: BatchId,
        expected_version: u64,
        batch: &Batch,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE batches
            SET version = $1, status = $2, record = $3, completed_at = $4
            WHERE id = $5 AND version = $6
            "#,
        )
        .bind(batch.version as i64)
        .bind(batch.status.as_str())
        .bind(Json(batch))
        .bind(batch.completed_at)
        .bind(id.as_uuid())
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let row = sqlx::query("SELECT version FROM batches WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        match row {
            Some(row) => Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected_version.to_string(),
                actual: row.try_get::<i64, _>("version").map_err(corrupt)?.to_string(),
            }),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    #[instrument(skip(self), fields(status = %status))]
    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query("SELECT record FROM jobs WHERE status = $1 ORDER BY submitted_at")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)?;

        rows.iter().map(decode_job).collect()
    }

    #[instrument(skip(self))]
    async fn list_batches_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BatchId>, StoreError> {
        let rows = sqlx::query(
            "SELECT id FROM batches WHERE completed_at IS NOT NULL AND completed_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("id")
                    .map(BatchId::from_uuid)
                    .map_err(corrupt)
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn list_standalone_jobs_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CompletedJobRef>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, record->'input'->'document'->'storage_path' AS storage_path
            FROM jobs
            WHERE batch_id IS NULL AND completed_at < $1
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter()
            .map(|row| {
                Ok(CompletedJobRef {
                    id: JobId::from_uuid(row.try_get::<Uuid, _>("id").map_err(corrupt)?),
                    storage_path: row
                        .try_get::<Option<Json<StoragePath>>, _>("storage_path")
                        .map_err(corrupt)?
                        .map(|Json(path)| path),
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn expire_job(&self, id: JobId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self), fields(batch_id = %id))]
    async fn expire_batch(&self, id: BatchId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM batches WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }
}
