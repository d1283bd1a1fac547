use async_trait::async_trait;
use bytes::Bytes;

/// A document downloaded from a client-supplied URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// Last path segment of the URL.
    pub filename: String,
    /// Empty when the body exceeded the size limit.
    pub data: Bytes,
    /// Bytes received before the download completed or was cut off.
    pub size_bytes: u64,
}

impl FetchedDocument {
    pub fn is_truncated(&self) -> bool {
        self.size_bytes > self.data.len() as u64
    }
}

/// Downloads documents submitted by URL instead of as uploads.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("invalid document url {0}")]
    InvalidUrl(String),
    #[error("document url {url} answered {status}")]
    Status { url: String, status: u16 },
    #[error("document url {url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },
}
