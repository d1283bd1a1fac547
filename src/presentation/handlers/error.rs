use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::ports::{ConverterError, FetchError, StoreError};
use crate::application::services::{GatewayError, ValidationError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// An error response with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                kind,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        let status = match &error {
            ValidationError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ValidationError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ValidationError::Fetch(FetchError::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
            ValidationError::Fetch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, "validation_error", error.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::new(
            error.status(),
            "validation_error",
            format!("Failed to read multipart: {}", error.body_text()),
        )
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        let message = error.to_string();
        match error {
            GatewayError::Validation(e) => e.into(),
            GatewayError::Dispatch(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "dispatch_error", message)
            }
            GatewayError::Conversion(e) => {
                let (status, kind) = match e {
                    ConverterError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
                    ConverterError::UnsupportedFormat(_) => {
                        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "conversion_error")
                    }
                    ConverterError::ConversionFailed(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "conversion_error")
                    }
                    ConverterError::Unavailable(_) => (StatusCode::BAD_GATEWAY, "conversion_error"),
                };
                Self::new(status, kind, message)
            }
            GatewayError::JobNotFound(_) | GatewayError::BatchNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "not_found", message)
            }
            GatewayError::NotRetryable { .. } => Self::new(StatusCode::CONFLICT, "conflict", message),
            GatewayError::Store(StoreError::Unavailable(_)) => {
                tracing::error!(error = %message, "Status store unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "internal_error", message)
            }
            GatewayError::Store(_) => {
                tracing::error!(error = %message, "Status store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        }
    }
}
