//! 请求权限网关集成测试

use axum::{body::Body, http::Request, http::StatusCode};
use residence_portal::models::page::Page;
use std::sync::atomic::Ordering;

mod common;
use common::*;

#[tokio::test]
async fn test_anonymous_page_redirects_to_login() {
    let (app, _) = create_app(MemoryPermissionStore::new());

    let response = send(&app, get("/Purchasing/Supplier/Index", None)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/Login"));
}

#[tokio::test]
async fn test_anonymous_api_gets_401() {
    let (app, _) = create_app(MemoryPermissionStore::new());

    let response = send(&app, get("/api/Lookup/company?term=a", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
}

#[tokio::test]
async fn test_public_paths_need_no_session() {
    let (app, _) = create_app(MemoryPermissionStore::new());

    let response = send(&app, get("/Login", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get("/AccessDenied", None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // 首页公开，但未登录时由页面自身跳转登录
    let response = send(&app, get("/", None)).await;
    assert_eq!(location(&response), Some("/Login"));
}

#[tokio::test]
async fn test_invalid_token_treated_as_anonymous() {
    let (app, _) = create_app(MemoryPermissionStore::new());

    let response = send(&app, get("/Cus/MeterUpload/Index", Some("not-a-token"))).await;
    assert_eq!(location(&response), Some("/Login"));
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let store = MemoryPermissionStore::new();
    let (app, state) = create_app(store.clone());
    let token = session_token(&state, "ADMIN", 1, true);

    let request = Request::builder()
        .uri("/Cus/MeterUpload/Index")
        .header("cookie", format!("theme=dark; portal_session={}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_bypasses_url_check() {
    let store = MemoryPermissionStore::new();
    let (app, state) = create_app(store.clone());
    let token = session_token(&state, "ADMIN", 1, true);

    let response = send(&app, get("/Cus/MeterUpload/Index", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.url_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.permission_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_page_outside_allowed_urls_redirects_to_access_denied() {
    let store = MemoryPermissionStore::new();
    store.set_urls("EMP01", &["/Infor/PeriodOccupied/Index"]);
    let (app, state) = create_app(store.clone());
    let token = session_token(&state, "EMP01", 5, false);

    let response = send(&app, get("/Cus/MeterUpload/Index", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/AccessDenied"));
}

#[tokio::test]
async fn test_store_failure_redirects_to_access_denied() {
    let store = MemoryPermissionStore::new();
    store.set_urls("EMP01", &["/Cus/MeterUpload/Index"]);
    store.set_failing(true);
    let (app, state) = create_app(store.clone());
    let token = session_token(&state, "EMP01", 5, false);

    let response = send(&app, get("/Cus/MeterUpload/Index", Some(&token))).await;
    assert_eq!(location(&response), Some("/AccessDenied"));
}

#[tokio::test]
async fn test_allowed_url_then_page_action_check() {
    let store = MemoryPermissionStore::new();
    store.set_urls("EMP01", &["/cus/meterupload/index/"]);
    store.grant(5, Page::MeterReading.function_id(), "2");
    let (app, state) = create_app(store.clone());
    let token = session_token(&state, "EMP01", 5, false);

    let response = send(&app, get("/Cus/MeterUpload/Index?month=3&year=2025", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["month"], 3);
    assert_eq!(json["year"], 2025);

    // 第二次请求命中 URL 缓存
    send(&app, get("/Cus/MeterUpload/Index", Some(&token))).await;
    assert_eq!(store.url_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_index_url_grants_sub_paths() {
    let store = MemoryPermissionStore::new();
    store.set_urls("EMP01", &["/Cus/MeterCheck/Index"]);
    // 有上传权限但没有查看权限
    store.grant(5, Page::MeterReading.function_id(), "2");
    let (app, state) = create_app(store.clone());
    let token = session_token(&state, "EMP01", 5, false);

    let response = send(&app, get("/Cus/MeterCheck/Photo/15", Some(&token))).await;
    // 通过网关，由页面动作检查拒绝
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], 403);
}

#[tokio::test]
async fn test_module_membership_for_short_term_detail() {
    let store = MemoryPermissionStore::new();
    store.set_urls("EMP01", &["/Sales/STContract/Index"]);
    store.set_urls("EMP02", &["/Sales/LongTermContract/Index"]);
    store.grant(5, Page::ShortTermContract.function_id(), "1");
    let (app, state) = create_app(store.clone());

    let member = session_token(&state, "EMP01", 5, false);
    let response = send(&app, get("/Sales/STContract/STContractDetail", Some(&member))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let outsider = session_token(&state, "EMP02", 5, false);
    let response = send(&app, get("/Sales/STContract/STContractDetail", Some(&outsider))).await;
    assert_eq!(location(&response), Some("/AccessDenied"));
}

#[tokio::test]
async fn test_authenticated_api_skips_url_check() {
    let store = MemoryPermissionStore::new();
    let (app, state) = create_app(store.clone());
    let token = session_token(&state, "EMP01", 5, false);

    let response = send(&app, get("/api/Lookup/employee", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.url_calls.load(Ordering::SeqCst), 0);
}
