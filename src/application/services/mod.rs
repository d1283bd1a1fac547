mod batch_orchestrator;
mod conversion_runner;
mod conversion_worker;
mod document_validator;
mod retention_reaper;
mod retry_policy;
mod submission_gateway;
mod worker_pool;

pub use batch_orchestrator::BatchOrchestrator;
pub use conversion_runner::ConversionRunner;
pub use conversion_worker::{ConversionWorker, DeliveryOutcome, WorkerError};
pub use document_validator::{DocumentValidator, Upload, ValidationError};
pub use retention_reaper::{RetentionReaper, RetentionSettings, SweepReport};
pub use retry_policy::RetryPolicy;
pub use submission_gateway::{
    BatchView, ConversionGateway, GatewayError, GatewayLimits, HealthReport, SyncOutcome,
};
pub use worker_pool::WorkerPool;
