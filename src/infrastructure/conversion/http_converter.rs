use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::application::ports::{ConverterError, DocumentConverter};
use crate::domain::{
    ConversionOptions, ConversionResult, EXTRACT_TABLES_AS_IMAGES_KEY, IMAGE_RESOLUTION_SCALE_KEY,
    ImageAsset, SourceDocument,
};

pub const CONVERT_PATH: &str = "/v1/convert/file";

/// Client for an external document conversion service.
///
/// The document is posted as multipart `file` together with the conversion
/// options as text fields; the service answers with the markdown and any
/// extracted images.
pub struct HttpDocumentConverter {
    client: Client,
    endpoint: String,
    request_timeout: Duration,
}

impl HttpDocumentConverter {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, ConverterError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConverterError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    fn form(document: &SourceDocument, options: &ConversionOptions) -> Result<Form, ConverterError> {
        let part = Part::bytes(document.data.to_vec())
            .file_name(document.filename.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| ConverterError::ConversionFailed(e.to_string()))?;

        Ok(Form::new()
            .part("file", part)
            .text("input_format", document.format.as_str())
            .text(
                IMAGE_RESOLUTION_SCALE_KEY,
                options.image_resolution_scale.to_string(),
            )
            .text(
                EXTRACT_TABLES_AS_IMAGES_KEY,
                options.extract_tables_as_images.to_string(),
            ))
    }
}

#[async_trait]
impl DocumentConverter for HttpDocumentConverter {
    #[tracing::instrument(
        skip(self, document, options),
        fields(filename = %document.filename, format = document.format.as_str())
    )]
    async fn convert(
        &self,
        document: &SourceDocument,
        options: &ConversionOptions,
    ) -> Result<ConversionResult, ConverterError> {
        let url = format!("{}{}", self.endpoint, CONVERT_PATH);

        let response = self
            .client
            .post(&url)
            .multipart(Self::form(document, options)?)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConverterError::Timeout(self.request_timeout)
                } else {
                    ConverterError::Unavailable(format!("conversion request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE {
            let text = response.text().await.unwrap_or_default();
            return Err(ConverterError::UnsupportedFormat(text));
        }
        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConverterError::Unavailable(format!(
                "conversion service returned {status}: {text}"
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConverterError::ConversionFailed(format!(
                "conversion service returned {status}: {text}"
            )));
        }

        let body: ConvertResponse = response.json().await.map_err(|e| {
            ConverterError::ConversionFailed(format!("conversion response parse failed: {e}"))
        })?;

        body.into_result(&document.filename)
    }
}

#[derive(Debug, Deserialize)]
pub struct ConvertResponse {
    pub filename: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    pub error: Option<String>,
}

impl ConvertResponse {
    /// A response carrying `error`, or no markdown at all, is a failed
    /// conversion.
    pub fn into_result(self, requested_filename: &str) -> Result<ConversionResult, ConverterError> {
        if let Some(error) = self.error.filter(|e| !e.is_empty()) {
            return Err(ConverterError::ConversionFailed(error));
        }
        let markdown = self.markdown.ok_or_else(|| {
            ConverterError::ConversionFailed("conversion response has no markdown".to_string())
        })?;

        Ok(ConversionResult {
            filename: self
                .filename
                .unwrap_or_else(|| requested_filename.to_string()),
            markdown,
            images: self.images,
        })
    }
}
