use std::collections::HashMap;

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{ConversionResult, Job, JobError, JobId, JobStatus};
use crate::presentation::state::AppState;

use super::error::ApiError;
use super::upload::{ConversionForm, single_document};

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub status: JobStatus,
    pub filename: String,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ConversionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<JobError>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            batch_id: job.batch_id.map(|id| id.to_string()),
            status: job.status,
            filename: job.input.filename,
            retry_count: job.retry_count,
            result: job.result,
            error: job.error,
            last_error: job.last_error,
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            updated_at: job.updated_at,
        }
    }
}

pub(super) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid {what} ID: {raw}")))
}

#[tracing::instrument(skip(state, query, multipart))]
pub async fn submit_job_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = ConversionForm::read(&mut multipart, state.limits.max_document_bytes).await?;
    let options = form.options(&query)?;
    let upload = single_document(form.into_uploads(&state.gateway).await?)?;

    let job_id = state.gateway.submit_async(upload, options).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job_id.to_string(),
            status: JobStatus::Pending,
        }),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn job_status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let uuid = parse_id(&job_id, "job")?;
    let job = state.gateway.get_job_status(JobId::from_uuid(uuid)).await?;
    Ok(Json(job.into()))
}

#[tracing::instrument(skip(state))]
pub async fn retry_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let uuid = parse_id(&job_id, "job")?;
    let job = state.gateway.retry_job(JobId::from_uuid(uuid)).await?;
    Ok((StatusCode::ACCEPTED, Json(JobStatusResponse::from(job))))
}
