use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ConversionOptions, ConversionResult, SourceDocument};

/// The external conversion collaborator.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(
        &self,
        document: &SourceDocument,
        options: &ConversionOptions,
    ) -> Result<ConversionResult, ConverterError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConverterError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("conversion failed: {0}")]
    ConversionFailed(String),
    #[error("converter unavailable: {0}")]
    Unavailable(String),
    #[error("conversion timed out after {0:?}")]
    Timeout(Duration),
}

impl ConverterError {
    /// Whether the same document may convert on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ConverterError::UnsupportedFormat(_))
    }
}
