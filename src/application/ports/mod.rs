mod broker_channel;
mod document_converter;
mod document_fetcher;
mod job_status_store;
mod staging_store;
mod store_error;

pub use broker_channel::{BrokerChannel, BrokerError, Delivery};
pub use document_converter::{ConverterError, DocumentConverter};
pub use document_fetcher::{DocumentFetcher, FetchError, FetchedDocument};
pub use job_status_store::{CompletedJobRef, JobStatusStore};
pub use staging_store::{StagingStore, StagingStoreError};
pub use store_error::StoreError;
