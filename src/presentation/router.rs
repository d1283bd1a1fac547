use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    batch_convert_handler, batch_status_handler, convert_handler, health_handler,
    job_status_handler, retry_job_handler, submit_batch_handler, submit_job_handler,
};
use crate::presentation::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let single_limit = state.limits.single_body_bytes();
    let batch_limit = state.limits.batch_body_bytes();

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/documents/convert",
            post(convert_handler).layer(DefaultBodyLimit::max(single_limit)),
        )
        .route(
            "/documents/batch-convert",
            post(batch_convert_handler).layer(DefaultBodyLimit::max(batch_limit)),
        )
        .route(
            "/conversion-jobs",
            post(submit_job_handler).layer(DefaultBodyLimit::max(single_limit)),
        )
        .route("/conversion-jobs/{job_id}", get(job_status_handler))
        .route("/conversion-jobs/{job_id}/retry", post(retry_job_handler))
        .route(
            "/batch-conversion-jobs",
            post(submit_batch_handler).layer(DefaultBodyLimit::max(batch_limit)),
        )
        .route(
            "/batch-conversion-jobs/{batch_id}",
            get(batch_status_handler),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
