//! 健康检查 API 集成测试

use axum::http::StatusCode;

mod common;
use common::*;

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_app(MemoryPermissionStore::new());

    let response = send(&app, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["uptime_secs"].is_number());
}

#[tokio::test]
async fn test_readiness_reports_each_check() {
    let store = MemoryPermissionStore::new();
    let (app, _) = create_app(store.clone());

    // 测试数据库不可达
    let response = send(&app, get("/ready", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ready"], false);

    let checks = json["checks"].as_array().unwrap();
    let status_of = |name: &str| {
        checks
            .iter()
            .find(|c| c["name"] == name)
            .map(|c| c["status"].clone())
    };
    assert_eq!(status_of("database").unwrap(), "unhealthy");
    assert_eq!(status_of("uploads").unwrap(), "healthy");

    // 探针不经过权限网关
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn test_readiness_flags_missing_upload_dir() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let mut config = create_test_config();
    config.storage.upload_root = temp_dir
        .path()
        .join("not-created")
        .to_string_lossy()
        .to_string();

    let state = create_app_state_with_config(config, MemoryPermissionStore::new());
    let app = residence_portal::routes::create_router(state);

    let json = body_json(send(&app, get("/ready", None)).await).await;
    let uploads = json["checks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "uploads")
        .cloned()
        .unwrap();
    assert_eq!(uploads["status"], "unhealthy");
    assert!(uploads["message"].as_str().unwrap().contains("not-created"));
}
