use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::Field;
use bytes::BytesMut;

use crate::application::services::{ConversionGateway, Upload, ValidationError};
use crate::domain::ConversionOptions;

use super::error::ApiError;

/// Text fields naming a document to download instead of an uploaded part.
const URL_FIELDS: [&str; 2] = ["url", "urls"];

/// Documents, document URLs and option fields of a multipart conversion
/// request.
#[derive(Debug, Default)]
pub struct ConversionForm {
    pub documents: Vec<Upload>,
    pub urls: Vec<String>,
    option_fields: Vec<(String, String)>,
}

impl ConversionForm {
    /// Reads every part: parts with a filename are documents, `url`/`urls`
    /// fields are document URLs and the remaining text parts are conversion
    /// options. A document over `max_document_bytes` is kept as an oversized
    /// upload without its body.
    pub async fn read(multipart: &mut Multipart, max_document_bytes: u64) -> Result<Self, ApiError> {
        let mut form = ConversionForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let upload = read_document(field, filename, max_document_bytes).await?;
                    tracing::debug!(
                        field = %name,
                        filename = %upload.filename,
                        bytes = upload.size_bytes,
                        "Document part received"
                    );
                    form.documents.push(upload);
                }
                None if URL_FIELDS.contains(&name.as_str()) => {
                    let value = field.text().await?;
                    let url = value.trim();
                    if !url.is_empty() {
                        form.urls.push(url.to_string());
                    }
                }
                None => {
                    let value = field.text().await?;
                    form.option_fields.push((name, value));
                }
            }
        }

        Ok(form)
    }

    /// Merges query-string options with form fields; form fields win.
    pub fn options(&self, query: &HashMap<String, String>) -> Result<ConversionOptions, ApiError> {
        let mut merged: Vec<(&str, &str)> = query
            .iter()
            .filter(|(key, _)| !self.option_fields.iter().any(|(name, _)| name == *key))
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        merged.extend(
            self.option_fields
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );

        ConversionOptions::from_pairs(merged)
            .map_err(|e| ApiError::from(ValidationError::InvalidOptions(e)))
    }

    /// Uploaded documents followed by the downloaded URL documents.
    pub async fn into_uploads(self, gateway: &ConversionGateway) -> Result<Vec<Upload>, ApiError> {
        let mut uploads = self.documents;
        if !self.urls.is_empty() {
            uploads.extend(gateway.fetch_documents(&self.urls).await?);
        }
        Ok(uploads)
    }
}

pub fn single_document(mut uploads: Vec<Upload>) -> Result<Upload, ApiError> {
    match uploads.len() {
        0 => Err(ValidationError::NoDocuments.into()),
        1 => Ok(uploads.remove(0)),
        n => Err(ValidationError::MalformedRequest(format!(
            "expected one document, received {n}"
        ))
        .into()),
    }
}

/// Streams one document part. Past the limit the buffered body is dropped
/// and only the byte count is kept.
async fn read_document(
    mut field: Field<'_>,
    filename: String,
    max_document_bytes: u64,
) -> Result<Upload, ApiError> {
    let mut data = BytesMut::new();
    let mut size_bytes = 0u64;

    while let Some(chunk) = field.chunk().await? {
        size_bytes += chunk.len() as u64;
        if size_bytes <= max_document_bytes {
            data.extend_from_slice(&chunk);
        } else if !data.is_empty() {
            data = BytesMut::new();
        }
    }

    if size_bytes > max_document_bytes {
        return Ok(Upload::oversized(filename, size_bytes));
    }
    Ok(Upload::new(filename, data.freeze()))
}
