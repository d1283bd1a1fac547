use std::time::Duration;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{BrokerChannel, BrokerError, Delivery};
use crate::domain::TaskMessage;

/// Durable broker on a Postgres `task_queue` table.
///
/// Consumers claim with `FOR UPDATE SKIP LOCKED` and push `visible_at` out by
/// the visibility timeout; all deadlines use the database clock.
pub struct PgBroker {
    pool: PgPool,
    visibility_timeout: Duration,
    poll_interval: Duration,
}

impl PgBroker {
    pub fn new(pool: PgPool, visibility_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            pool,
            visibility_timeout,
            poll_interval,
        }
    }

    async fn try_claim(&self) -> Result<Option<Delivery>, BrokerError> {
        let receipt = Uuid::new_v4();

        let row = sqlx::query(
            r#"
            UPDATE task_queue
            SET receipt = $1,
                delivery_count = delivery_count + 1,
                visible_at = now() + $2::bigint * interval '1 millisecond'
            WHERE message_id = (
                SELECT message_id FROM task_queue
                WHERE visible_at <= now()
                ORDER BY visible_at, enqueued_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING message_id, delivery_count, payload
            "#,
        )
        .bind(receipt)
        .bind(self.visibility_timeout.as_millis() as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let message_id: Uuid = row.try_get("message_id").map_err(malformed)?;
        let delivery_count: i32 = row.try_get("delivery_count").map_err(malformed)?;

        match row.try_get::<Json<TaskMessage>, _>("payload") {
            Ok(Json(task)) => Ok(Some(Delivery {
                message_id,
                receipt,
                delivery_count: delivery_count.max(0) as u32,
                task,
            })),
            Err(e) => {
                tracing::error!(%message_id, error = %e, "Dropping undecodable task message");
                sqlx::query("DELETE FROM task_queue WHERE message_id = $1")
                    .bind(message_id)
                    .execute(&self.pool)
                    .await
                    .map_err(unavailable)?;
                Err(malformed(e))
            }
        }
    }
}

fn unavailable(e: sqlx::Error) -> BrokerError {
    BrokerError::Unavailable(e.to_string())
}

fn malformed(e: sqlx::Error) -> BrokerError {
    BrokerError::Malformed(e.to_string())
}

#[async_trait]
impl BrokerChannel for PgBroker {
    #[instrument(skip(self, task), fields(job_id = %task.job_id, attempt = task.attempt, delay_ms = delay.as_millis() as u64))]
    async fn publish(&self, task: &TaskMessage, delay: Duration) -> Result<(), BrokerError> {
        sqlx::query(
            r#"
            INSERT INTO task_queue (message_id, job_id, payload, visible_at, delivery_count, enqueued_at)
            VALUES ($1, $2, $3, now() + $4::bigint * interval '1 millisecond', 0, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(task.job_id.as_uuid())
        .bind(Json(task))
        .bind(delay.as_millis() as i64)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn consume(&self) -> Result<Delivery, BrokerError> {
        loop {
            if let Some(delivery) = self.try_claim().await? {
                return Ok(delivery);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    #[instrument(skip(self, delivery), fields(message_id = %delivery.message_id))]
    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let result = sqlx::query("DELETE FROM task_queue WHERE message_id = $1 AND receipt = $2")
            .bind(delivery.message_id)
            .bind(delivery.receipt)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(BrokerError::UnknownReceipt(delivery.message_id));
        }
        Ok(())
    }

    #[instrument(skip(self, delivery), fields(message_id = %delivery.message_id))]
    async fn nack(&self, delivery: &Delivery, delay: Duration) -> Result<(), BrokerError> {
        let result = sqlx::query(
            r#"
            UPDATE task_queue
            SET receipt = NULL, visible_at = now() + $3::bigint * interval '1 millisecond'
            WHERE message_id = $1 AND receipt = $2
            "#,
        )
        .bind(delivery.message_id)
        .bind(delivery.receipt)
        .bind(delay.as_millis() as i64)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(BrokerError::UnknownReceipt(delivery.message_id));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
