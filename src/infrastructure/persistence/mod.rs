mod pg_pool;
mod repositories;
mod store_factory;

pub use pg_pool::{create_pool, run_migrations};
pub use repositories::{InMemoryJobStatusStore, PgJobStatusStore};
pub use store_factory::JobStatusStoreFactory;
