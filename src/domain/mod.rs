mod batch;
mod conversion_options;
mod conversion_result;
mod document;
mod job;
mod job_id;
mod job_status;
mod storage_path;
mod task_message;

pub use batch::{Batch, BatchCounts, BatchStatus};
pub use conversion_options::{
    ConversionOptions, EXTRACT_TABLES_AS_IMAGES_KEY, IMAGE_RESOLUTION_SCALE_KEY,
    MAX_IMAGE_RESOLUTION_SCALE, MIN_IMAGE_RESOLUTION_SCALE, OPTIONS_VERSION, OptionsError,
};
pub use conversion_result::{ConversionResult, ImageAsset, ImageKind};
pub use document::{InputFormat, SourceDocument};
pub use job::{DocumentRef, InvalidTransition, Job, JobError, JobErrorKind, JobInput};
pub use job_id::{BatchId, JobId};
pub use job_status::JobStatus;
pub use storage_path::StoragePath;
pub use task_message::TaskMessage;
