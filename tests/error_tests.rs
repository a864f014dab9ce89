//! 错误处理单元测试
//!
//! 状态码、对外消息与响应体格式

use axum::{http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;
use residence_portal::{error::AppError, repository::LookupError};

#[test]
fn test_error_status_codes() {
    assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        AppError::BadRequest("invalid".to_string()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::Conflict("duplicate".to_string()).status_code(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        AppError::Upstream("vision".to_string()).status_code(),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        AppError::Database(sqlx::Error::RowNotFound).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        AppError::Config("missing".to_string()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_user_messages_hide_internal_details() {
    let message = AppError::Database(sqlx::Error::RowNotFound).user_message();
    assert_eq!(message, "Database error occurred");
    assert!(!message.to_lowercase().contains("row"));

    assert_eq!(
        AppError::Config("Missing SMTP password".to_string()).user_message(),
        "Configuration error"
    );
    assert_eq!(
        AppError::Upstream("HTTP 500 from https://vision".to_string()).user_message(),
        "Upstream service unavailable"
    );
}

#[test]
fn test_client_error_messages_pass_through() {
    assert_eq!(
        AppError::BadRequest("Select at least one record.".to_string()).user_message(),
        "Select at least one record."
    );
    assert_eq!(
        AppError::Conflict("Apartment is occupied.".to_string()).user_message(),
        "Apartment is occupied."
    );
}

#[test]
fn test_permission_lookup_failure_is_forbidden() {
    let error: AppError = LookupError::Store(sqlx::Error::PoolTimedOut).into();
    assert!(matches!(error, AppError::Forbidden));
}

#[tokio::test]
async fn test_error_response_body() {
    let response = AppError::BadRequest("Invalid month.".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["ok"], false);
    assert_eq!(json["code"], 400);
    assert_eq!(json["message"], "Invalid month.");
    assert!(json["request_id"].is_string());
}
