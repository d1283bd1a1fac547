use std::collections::HashMap;

use axum::Json;
use axum::extract::{Multipart, Query, State};
use serde::Serialize;

use crate::domain::{ConversionResult, ImageAsset};
use crate::presentation::state::AppState;

use super::error::ApiError;
use super::upload::{ConversionForm, single_document};

/// One entry of a synchronous batch response. Failed documents carry
/// `error` and no markdown.
#[derive(Debug, Serialize)]
pub struct BatchConvertItem {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[tracing::instrument(skip(state, query, multipart))]
pub async fn convert_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Result<Json<ConversionResult>, ApiError> {
    let form = ConversionForm::read(&mut multipart, state.limits.max_document_bytes).await?;
    let options = form.options(&query)?;
    let upload = single_document(form.into_uploads(&state.gateway).await?)?;

    let result = state.gateway.submit_sync(upload, options).await?;
    Ok(Json(result))
}

#[tracing::instrument(skip(state, query, multipart))]
pub async fn batch_convert_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<BatchConvertItem>>, ApiError> {
    let form = ConversionForm::read(&mut multipart, state.limits.max_document_bytes).await?;
    let options = form.options(&query)?;
    let uploads = form.into_uploads(&state.gateway).await?;

    let outcomes = state.gateway.submit_batch_sync(uploads, options).await?;

    let items = outcomes
        .into_iter()
        .map(|outcome| match outcome.outcome {
            Ok(result) => BatchConvertItem {
                filename: result.filename,
                markdown: Some(result.markdown),
                images: result.images,
                error: None,
            },
            Err(e) => BatchConvertItem {
                filename: outcome.filename,
                markdown: None,
                images: Vec::new(),
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(items))
}
