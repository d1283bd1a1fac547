use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub status_store: &'static str,
    pub broker: &'static str,
}

fn up_or_down(healthy: bool) -> &'static str {
    if healthy { "up" } else { "down" }
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.gateway.health().await;

    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if report.is_healthy() { "healthy" } else { "unhealthy" },
            services: ServiceHealth {
                status_store: up_or_down(report.store),
                broker: up_or_down(report.broker),
            },
        }),
    )
}
