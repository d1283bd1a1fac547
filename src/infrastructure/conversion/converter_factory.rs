use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{ConverterError, DocumentConverter};
use crate::presentation::config::{ConverterProvider, ConverterSettings};

use super::http_converter::HttpDocumentConverter;
use super::plain_text_converter::PlainTextConverter;

pub struct ConverterFactory;

impl ConverterFactory {
    pub fn create(settings: &ConverterSettings) -> Result<Arc<dyn DocumentConverter>, ConverterError> {
        match settings.provider {
            ConverterProvider::Http => {
                let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
                    ConverterError::Unavailable("converter.endpoint required".into())
                })?;
                tracing::info!(endpoint, "Using HTTP conversion service");
                let converter = HttpDocumentConverter::new(
                    endpoint,
                    Duration::from_secs(settings.request_timeout_secs),
                )?;
                Ok(Arc::new(converter))
            }
            ConverterProvider::PlainText => {
                tracing::info!("Using built-in text converter");
                Ok(Arc::new(PlainTextConverter))
            }
        }
    }
}
