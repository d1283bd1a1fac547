use std::collections::HashMap;

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::services::BatchView;
use crate::domain::{BatchCounts, BatchId, BatchStatus};
use crate::presentation::state::AppState;

use super::conversion_jobs::{JobStatusResponse, parse_id};
use super::error::ApiError;
use super::upload::ConversionForm;

#[derive(Debug, Serialize)]
pub struct SubmitBatchResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    pub job_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchStatusResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    pub counts: BatchCounts,
    pub jobs: Vec<JobStatusResponse>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<BatchView> for BatchStatusResponse {
    fn from(view: BatchView) -> Self {
        let BatchView { batch, jobs } = view;
        Self {
            batch_id: batch.id.to_string(),
            status: batch.status,
            counts: batch.counts,
            jobs: jobs.into_iter().map(JobStatusResponse::from).collect(),
            created_at: batch.created_at,
            completed_at: batch.completed_at,
        }
    }
}

#[tracing::instrument(skip(state, query, multipart))]
pub async fn submit_batch_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = ConversionForm::read(&mut multipart, state.limits.max_document_bytes).await?;
    let options = form.options(&query)?;
    let uploads = form.into_uploads(&state.gateway).await?;

    let batch_id = state.gateway.submit_batch_async(uploads, options).await?;
    let view = state.gateway.get_batch_status(batch_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitBatchResponse {
            batch_id: batch_id.to_string(),
            status: view.batch.status,
            job_ids: view.batch.job_ids.iter().map(ToString::to_string).collect(),
        }),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn batch_status_handler(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchStatusResponse>, ApiError> {
    let uuid = parse_id(&batch_id, "batch")?;
    let view = state
        .gateway
        .get_batch_status(BatchId::from_uuid(uuid))
        .await?;
    Ok(Json(view.into()))
}
