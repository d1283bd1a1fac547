mod in_memory_job_status_store;
mod pg_job_status_store;

pub use in_memory_job_status_store::InMemoryJobStatusStore;
pub use pg_job_status_store::PgJobStatusStore;
