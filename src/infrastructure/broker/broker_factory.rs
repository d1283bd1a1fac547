use std::sync::Arc;

use sqlx::PgPool;

use crate::application::ports::{BrokerChannel, BrokerError};
use crate::presentation::config::{BrokerSettings, StoreProvider};

use super::in_memory_broker::InMemoryBroker;
use super::pg_broker::PgBroker;

pub struct BrokerFactory;

impl BrokerFactory {
    /// `pool` must be present for the postgres provider.
    pub fn create(
        settings: &BrokerSettings,
        pool: Option<PgPool>,
    ) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        match settings.provider {
            StoreProvider::Postgres => {
                let pool = pool.ok_or_else(|| {
                    BrokerError::Unavailable("postgres broker requires a connection pool".into())
                })?;
                tracing::info!(
                    visibility_timeout_secs = settings.visibility_timeout_secs,
                    "Using Postgres task queue"
                );
                Ok(Arc::new(PgBroker::new(
                    pool,
                    settings.visibility_timeout(),
                    settings.poll_interval(),
                )))
            }
            StoreProvider::Memory => {
                tracing::info!("Using in-memory task queue");
                Ok(Arc::new(InMemoryBroker::new(settings.visibility_timeout())))
            }
        }
    }
}
