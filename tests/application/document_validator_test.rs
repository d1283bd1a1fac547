use docconv::application::services::{DocumentValidator, Upload, ValidationError};
use docconv::domain::InputFormat;

#[test]
fn given_markdown_upload_when_validated_then_accepted_with_detected_format() {
    let validator = DocumentValidator::new(1024);

    let document = validator
        .validate(Upload::new("notes.md", b"# Notes".to_vec()))
        .unwrap();

    assert_eq!(document.format, InputFormat::Md);
    assert_eq!(document.size_bytes(), 7);
}

#[test]
fn given_empty_upload_when_validated_then_rejected() {
    let validator = DocumentValidator::new(1024);

    let err = validator.validate(Upload::new("empty.md", Vec::new())).unwrap_err();

    assert_eq!(err, ValidationError::EmptyDocument("empty.md".to_string()));
}

#[test]
fn given_oversized_upload_when_validated_then_rejected_with_limit() {
    let validator = DocumentValidator::new(4);

    let err = validator
        .validate(Upload::new("big.md", b"# too large".to_vec()))
        .unwrap_err();

    assert_eq!(
        err,
        ValidationError::TooLarge {
            filename: "big.md".to_string(),
            size: 11,
            limit: 4,
        }
    );
}

#[test]
fn given_upload_dropped_while_streaming_when_validated_then_too_large_with_received_size() {
    let validator = DocumentValidator::new(1024);

    let err = validator
        .validate(Upload::oversized("huge.pdf", 4096))
        .unwrap_err();

    assert_eq!(
        err,
        ValidationError::TooLarge {
            filename: "huge.pdf".to_string(),
            size: 4096,
            limit: 1024,
        }
    );
}

#[test]
fn given_upload_at_exact_limit_when_validated_then_accepted() {
    let validator = DocumentValidator::new(7);

    assert!(validator.validate(Upload::new("notes.md", b"# Notes".to_vec())).is_ok());
}

#[test]
fn given_unrecognized_content_when_validated_then_unsupported_format() {
    let validator = DocumentValidator::new(1024);

    let err = validator
        .validate(Upload::new("notes.txt", b"plain words".to_vec()))
        .unwrap_err();

    assert!(matches!(err, ValidationError::UnsupportedFormat(_)));
}
