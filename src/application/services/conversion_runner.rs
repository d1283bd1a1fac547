use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{ConverterError, DocumentConverter};
use crate::domain::{ConversionOptions, ConversionResult, JobError, JobErrorKind, SourceDocument};

/// Invokes the conversion collaborator under a hard deadline.
///
/// On timeout the conversion future is dropped, which cancels the in-flight
/// call, and [`ConverterError::Timeout`] is returned.
#[derive(Clone)]
pub struct ConversionRunner {
    converter: Arc<dyn DocumentConverter>,
    timeout: Duration,
}

impl ConversionRunner {
    pub fn new(converter: Arc<dyn DocumentConverter>, timeout: Duration) -> Self {
        Self { converter, timeout }
    }

    pub async fn run(
        &self,
        document: &SourceDocument,
        options: &ConversionOptions,
    ) -> Result<ConversionResult, ConverterError> {
        match tokio::time::timeout(self.timeout, self.converter.convert(document, options)).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    filename = %document.filename,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Conversion exceeded timeout, cancelled"
                );
                Err(ConverterError::Timeout(self.timeout))
            }
        }
    }
}

impl From<&ConverterError> for JobError {
    fn from(error: &ConverterError) -> Self {
        let kind = match error {
            ConverterError::Timeout(_) => JobErrorKind::Timeout,
            _ => JobErrorKind::Conversion,
        };
        JobError::new(kind, error.to_string())
    }
}
