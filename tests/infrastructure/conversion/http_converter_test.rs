use std::time::Duration;

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;

use docconv::application::ports::{ConverterError, DocumentConverter};
use docconv::domain::{ConversionOptions, ImageKind, InputFormat, SourceDocument};
use docconv::infrastructure::conversion::{CONVERT_PATH, ConvertResponse, HttpDocumentConverter};

async fn spawn_service(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Echoes the received multipart fields back as markdown lines.
async fn echo_fields(mut multipart: Multipart) -> Json<serde_json::Value> {
    let mut lines = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let value = field.text().await.unwrap();
        match file_name {
            Some(file_name) => lines.push(format!("{name}={file_name}:{value}")),
            None => lines.push(format!("{name}={value}")),
        }
    }
    Json(json!({
        "filename": "converted.pdf",
        "markdown": lines.join("\n"),
        "images": [
            { "type": "table", "filename": "table-1.png", "image": "data:image/png;base64,AAAA" }
        ]
    }))
}

fn pdf() -> SourceDocument {
    SourceDocument::new(
        "report.pdf".to_string(),
        InputFormat::Pdf,
        Bytes::from_static(b"%PDF-1.7 body"),
    )
}

fn converter(endpoint: &str) -> HttpDocumentConverter {
    HttpDocumentConverter::new(endpoint, Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn given_healthy_service_when_converting_then_document_and_options_are_posted() {
    let endpoint = spawn_service(Router::new().route(CONVERT_PATH, post(echo_fields))).await;
    let options = ConversionOptions {
        image_resolution_scale: 2,
        extract_tables_as_images: true,
        ..ConversionOptions::default()
    };

    let result = converter(&format!("{endpoint}/"))
        .convert(&pdf(), &options)
        .await
        .unwrap();

    assert_eq!(result.filename, "converted.pdf");
    let lines: Vec<&str> = result.markdown.lines().collect();
    assert!(lines.contains(&"file=report.pdf:%PDF-1.7 body"));
    assert!(lines.contains(&"input_format=pdf"));
    assert!(lines.contains(&"image_resolution_scale=2"));
    assert!(lines.contains(&"extract_tables_as_images=true"));
    assert_eq!(result.images.len(), 1);
    assert_eq!(result.images[0].kind, Some(ImageKind::Table));
}

#[tokio::test]
async fn given_service_rejects_media_type_when_converting_then_unsupported_format() {
    let router = Router::new().route(
        CONVERT_PATH,
        post(|| async { (StatusCode::UNSUPPORTED_MEDIA_TYPE, "no pdf here").into_response() }),
    );
    let endpoint = spawn_service(router).await;

    let result = converter(&endpoint)
        .convert(&pdf(), &ConversionOptions::default())
        .await;

    assert_eq!(
        result,
        Err(ConverterError::UnsupportedFormat("no pdf here".to_string()))
    );
}

#[tokio::test]
async fn given_service_error_when_converting_then_unavailable() {
    let router = Router::new().route(
        CONVERT_PATH,
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let endpoint = spawn_service(router).await;

    let result = converter(&endpoint)
        .convert(&pdf(), &ConversionOptions::default())
        .await;

    assert!(matches!(result, Err(ConverterError::Unavailable(_))));
}

#[tokio::test]
async fn given_client_error_when_converting_then_conversion_failed() {
    let router = Router::new().route(CONVERT_PATH, post(|| async { StatusCode::BAD_REQUEST }));
    let endpoint = spawn_service(router).await;

    let result = converter(&endpoint)
        .convert(&pdf(), &ConversionOptions::default())
        .await;

    assert!(matches!(result, Err(ConverterError::ConversionFailed(_))));
}

#[tokio::test]
async fn given_error_body_when_converting_then_conversion_failed_with_message() {
    let router = Router::new().route(
        CONVERT_PATH,
        post(|| async { Json(json!({ "filename": "report.pdf", "error": "corrupt xref table" })) }),
    );
    let endpoint = spawn_service(router).await;

    let result = converter(&endpoint)
        .convert(&pdf(), &ConversionOptions::default())
        .await;

    assert_eq!(
        result,
        Err(ConverterError::ConversionFailed("corrupt xref table".to_string()))
    );
}

#[tokio::test]
async fn given_slow_service_when_converting_then_timeout() {
    let router = Router::new().route(
        CONVERT_PATH,
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    );
    let endpoint = spawn_service(router).await;

    let result = converter(&endpoint)
        .convert(&pdf(), &ConversionOptions::default())
        .await;

    assert_eq!(result, Err(ConverterError::Timeout(Duration::from_millis(500))));
}

#[tokio::test]
async fn given_unreachable_service_when_converting_then_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = converter(&endpoint)
        .convert(&pdf(), &ConversionOptions::default())
        .await;

    assert!(matches!(result, Err(ConverterError::Unavailable(_))));
}

#[test]
fn given_response_without_filename_when_mapped_then_requested_name_used() {
    let response: ConvertResponse = serde_json::from_value(json!({ "markdown": "# Hi" })).unwrap();

    let result = response.into_result("hi.docx").unwrap();

    assert_eq!(result.filename, "hi.docx");
    assert_eq!(result.markdown, "# Hi");
    assert!(result.images.is_empty());
}

#[test]
fn given_response_without_markdown_when_mapped_then_conversion_failed() {
    let response: ConvertResponse =
        serde_json::from_value(json!({ "filename": "empty.docx", "error": "" })).unwrap();

    let result = response.into_result("empty.docx");

    assert!(matches!(result, Err(ConverterError::ConversionFailed(_))));
}
