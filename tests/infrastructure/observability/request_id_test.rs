use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Extension, Router, middleware};
use tower::ServiceExt;

use docconv::infrastructure::observability::{REQUEST_ID_HEADER, RequestId, request_id_middleware};

fn app() -> Router {
    Router::new()
        .route(
            "/echo",
            get(|Extension(RequestId(id)): Extension<RequestId>| async move { id }),
        )
        .layer(middleware::from_fn(request_id_middleware))
}

#[tokio::test]
async fn given_request_with_id_when_handled_then_id_propagated() {
    let request = Request::builder()
        .uri("/echo")
        .header(REQUEST_ID_HEADER, "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-123");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"req-123");
}

#[tokio::test]
async fn given_request_without_id_when_handled_then_uuid_assigned() {
    let request = Request::builder().uri("/echo").body(Body::empty()).unwrap();

    let response = app().oneshot(request).await.unwrap();

    let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn given_oversized_request_id_when_handled_then_replaced() {
    let request = Request::builder()
        .uri("/echo")
        .header(REQUEST_ID_HEADER, "x".repeat(300))
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}
