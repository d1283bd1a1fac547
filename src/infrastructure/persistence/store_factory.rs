use std::sync::Arc;

use sqlx::PgPool;

use crate::application::ports::{JobStatusStore, StoreError};
use crate::presentation::config::{StoreProvider, StoreSettings};

use super::repositories::{InMemoryJobStatusStore, PgJobStatusStore};

pub struct JobStatusStoreFactory;

impl JobStatusStoreFactory {
    /// `pool` must be present for the postgres provider.
    pub fn create(
        settings: &StoreSettings,
        pool: Option<PgPool>,
    ) -> Result<Arc<dyn JobStatusStore>, StoreError> {
        match settings.provider {
            StoreProvider::Postgres => {
                let pool = pool.ok_or_else(|| {
                    StoreError::Unavailable("postgres store requires a connection pool".into())
                })?;
                tracing::info!("Using Postgres job status store");
                Ok(Arc::new(PgJobStatusStore::new(pool)))
            }
            StoreProvider::Memory => {
                tracing::info!("Using in-memory job status store");
                Ok(Arc::new(InMemoryJobStatusStore::new()))
            }
        }
    }
}
