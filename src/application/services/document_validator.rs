use bytes::Bytes;

use crate::application::ports::{FetchError, FetchedDocument};
use crate::domain::{InputFormat, OptionsError, SourceDocument};

/// A document as received from a client, before validation.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
    /// Bytes received. Larger than `data` when the body was dropped for
    /// exceeding the size limit.
    pub size_bytes: u64,
}

impl Upload {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            filename: filename.into(),
            size_bytes: data.len() as u64,
            data,
        }
    }

    /// An upload whose body was discarded once it passed the size limit.
    pub fn oversized(filename: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            filename: filename.into(),
            data: Bytes::new(),
            size_bytes,
        }
    }
}

impl From<FetchedDocument> for Upload {
    fn from(document: FetchedDocument) -> Self {
        Self {
            filename: document.filename,
            data: document.data,
            size_bytes: document.size_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no document provided")]
    NoDocuments,
    #[error("too many documents: {count} exceeds limit of {limit}")]
    TooManyDocuments { count: usize, limit: usize },
    #[error("document is empty: {0}")]
    EmptyDocument(String),
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("document {filename} is {size} bytes, limit is {limit}")]
    TooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("{0}")]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentValidator {
    max_size_bytes: u64,
}

impl DocumentValidator {
    pub fn new(max_size_bytes: u64) -> Self {
        Self { max_size_bytes }
    }

    pub fn validate(&self, upload: Upload) -> Result<SourceDocument, ValidationError> {
        let Upload {
            filename,
            data,
            size_bytes,
        } = upload;

        if size_bytes > self.max_size_bytes {
            return Err(ValidationError::TooLarge {
                filename,
                size: size_bytes,
                limit: self.max_size_bytes,
            });
        }
        if data.is_empty() {
            return Err(ValidationError::EmptyDocument(filename));
        }

        match InputFormat::detect(&data, &filename) {
            Some(format) => Ok(SourceDocument::new(filename, format, data)),
            None => Err(ValidationError::UnsupportedFormat(filename)),
        }
    }
}
