mod batch_jobs;
mod conversion_jobs;
mod convert;
mod error;
mod health;
mod upload;

pub use batch_jobs::{
    BatchStatusResponse, SubmitBatchResponse, batch_status_handler, submit_batch_handler,
};
pub use conversion_jobs::{
    JobStatusResponse, SubmitJobResponse, job_status_handler, retry_job_handler,
    submit_job_handler,
};
pub use convert::{BatchConvertItem, batch_convert_handler, convert_handler};
pub use error::{ApiError, ErrorResponse};
pub use health::health_handler;
