// =========================
// tests/unit/error_tests.rs
// =========================
//! Unit tests for the error module
use axum::http::StatusCode;
use axum::response::IntoResponse;
use backend_lib::auth::CredentialError;
use backend_lib::error::AppError;
use backend_lib::validation::ValidationError;
use uuid::Uuid;

#[test]
fn test_app_error_status_codes() {
    let cases = [
        (AppError::from(ValidationError::MissingField("email")), StatusCode::BAD_REQUEST),
        (AppError::InvalidInput("bad json".into()), StatusCode::BAD_REQUEST),
        (AppError::Conflict("Email already in use".into()), StatusCode::CONFLICT),
        (AppError::StaleRecord(Uuid::new_v4()), StatusCode::CONFLICT),
        (AppError::NotFound("account".into()), StatusCode::NOT_FOUND),
        (AppError::InvalidPassword, StatusCode::UNAUTHORIZED),
        (AppError::MalformedCredential(Uuid::new_v4()), StatusCode::UNPROCESSABLE_ENTITY),
        (AppError::from(CredentialError::EmptySecret), StatusCode::BAD_REQUEST),
        (
            AppError::from(CredentialError::Hashing("out of memory".into())),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (AppError::Internal("test".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (error, status) in cases {
        assert_eq!(error.status_code(), status, "{error}");
    }
}

#[test]
fn test_error_codes_are_stable() {
    assert_eq!(AppError::from(ValidationError::MissingField("email")).error_code(), "VAL_001");
    assert_eq!(AppError::Conflict(String::new()).error_code(), "CONFLICT_001");
    assert_eq!(AppError::StaleRecord(Uuid::nil()).error_code(), "CONFLICT_002");
    assert_eq!(AppError::NotFound(String::new()).error_code(), "NF_001");
    assert_eq!(AppError::InvalidPassword.error_code(), "AUTH_002");
    assert_eq!(AppError::MalformedCredential(Uuid::nil()).error_code(), "CRED_001");
}

#[test]
fn test_internal_details_are_sanitized() {
    let error = AppError::Internal("disk /var/lib/usermgmt full".into());
    assert!(!error.sanitized_message().contains("/var/lib"));
}

#[tokio::test]
async fn test_error_response_body() {
    let response = AppError::Conflict("Username already in use".into()).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "CONFLICT_001");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Username already in use"));
}
