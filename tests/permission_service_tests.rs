//! 权限服务集成测试：求值、管理员放行、数据范围与 URL 缓存

use residence_portal::{
    error::AppError,
    models::{
        page::{MeterReadingAction, Page, SupplierAction},
        role::{DataScope, EmployeeCode, Identity},
    },
    repository::LookupError,
    services::PermissionService,
};
use std::sync::atomic::Ordering;
use std::time::Duration;

mod common;
use common::MemoryPermissionStore;

fn service(store: &std::sync::Arc<MemoryPermissionStore>) -> PermissionService {
    PermissionService::new(store.clone(), Duration::from_secs(1200))
}

fn identity(code: &str, role_id: i32, is_admin: bool) -> Identity {
    Identity {
        employee_code: EmployeeCode::new(code),
        full_name: "Test User".to_string(),
        role_id,
        is_admin,
    }
}

#[tokio::test]
async fn test_role_permissions_parsed_per_page() {
    let store = MemoryPermissionStore::new();
    store.grant(5, Page::Supplier.function_id(), "1, 2,6");
    let service = service(&store);

    let perms = service
        .resolve_effective_permissions(&identity("EMP01", 5, false), Page::Supplier)
        .await
        .unwrap();

    assert!(perms.allows(SupplierAction::ViewList));
    assert!(perms.allows(SupplierAction::Add));
    assert!(perms.allows(SupplierAction::ViewDetail));
    assert!(!perms.allows(SupplierAction::Edit));
    // 其他页面的同号权限不生效
    assert!(!perms.allows(MeterReadingAction::View));
}

#[tokio::test]
async fn test_admin_bypass_skips_store() {
    let store = MemoryPermissionStore::new();
    let service = service(&store);

    let perms = service
        .require(&identity("ADMIN", 0, true), SupplierAction::CopyToYear)
        .await
        .unwrap();

    assert!(perms.allows(SupplierAction::ViewDetail));
    assert_eq!(store.permission_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_role_zero_has_no_permissions_without_lookup() {
    let store = MemoryPermissionStore::new();
    store.grant(0, Page::Supplier.function_id(), "1,2,3");
    let service = service(&store);

    let err = service
        .require(&identity("EMP02", 0, false), SupplierAction::ViewList)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden));
    assert_eq!(store.permission_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_row_and_malformed_string_deny() {
    let store = MemoryPermissionStore::new();
    store.grant(7, Page::MeterReading.function_id(), "1,,3");
    let service = service(&store);

    let missing = service
        .require(&identity("EMP03", 7, false), SupplierAction::ViewList)
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::Forbidden));

    let malformed = service
        .permissions_for_page(7, Page::MeterReading)
        .await
        .unwrap_err();
    assert!(matches!(malformed, LookupError::Malformed { .. }));

    let denied = service
        .require(&identity("EMP03", 7, false), MeterReadingAction::View)
        .await
        .unwrap_err();
    assert!(matches!(denied, AppError::Forbidden));
}

#[tokio::test]
async fn test_require_any() {
    let store = MemoryPermissionStore::new();
    store.grant(5, Page::Supplier.function_id(), "2");
    let service = service(&store);
    let user = identity("EMP04", 5, false);

    service
        .require_any(&user, &[SupplierAction::ViewDetail, SupplierAction::Add])
        .await
        .unwrap();

    let err = service
        .require_any(&user, &[SupplierAction::Edit, SupplierAction::Submit])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_data_scope_resolution() {
    let store = MemoryPermissionStore::new();
    store.set_scope("ALL01", Some(3), true);
    store.set_scope("DEP01", Some(3), false);
    store.set_scope("NODEPT", None, false);
    let service = service(&store);

    assert_eq!(
        service.data_scope(&identity("ADMIN", 1, true)).await.unwrap(),
        DataScope::AllDepartments
    );
    assert_eq!(store.scope_calls.load(Ordering::SeqCst), 0);

    assert_eq!(
        service.data_scope(&identity("ALL01", 2, false)).await.unwrap(),
        DataScope::AllDepartments
    );
    assert_eq!(
        service.data_scope(&identity("DEP01", 2, false)).await.unwrap(),
        DataScope::Department(3)
    );
    assert_eq!(
        service.data_scope(&identity("NODEPT", 2, false)).await.unwrap(),
        DataScope::Unassigned
    );
    assert_eq!(
        service.data_scope(&identity("GHOST", 2, false)).await.unwrap(),
        DataScope::Unassigned
    );
}

#[tokio::test]
async fn test_allowed_urls_cached_and_normalized() {
    let store = MemoryPermissionStore::new();
    store.set_urls("EMP05", &["/Purchasing/Supplier/Index/", "/Cus/MeterCheck/Index"]);
    let service = service(&store);
    let code = EmployeeCode::new("EMP05");

    let first = service.allowed_urls(&code).await.unwrap();
    assert!(first.contains(&"/purchasing/supplier/index".to_string()));
    assert!(first.contains(&"/cus/metercheck/index".to_string()));

    store.set_urls("EMP05", &[]);
    let second = service.allowed_urls(&code).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(store.url_calls.load(Ordering::SeqCst), 1);

    // 显式失效后重新读取
    service.invalidate_employee(&code).await;
    let third = service.allowed_urls(&code).await.unwrap();
    assert!(third.is_empty());
    assert_eq!(store.url_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_store_failure_is_not_cached() {
    let store = MemoryPermissionStore::new();
    store.set_urls("EMP06", &["/Infor/PeriodOccupied/Index"]);
    let service = service(&store);
    let code = EmployeeCode::new("EMP06");

    store.set_failing(true);
    assert!(service.allowed_urls(&code).await.is_err());

    store.set_failing(false);
    let urls = service.allowed_urls(&code).await.unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(store.url_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_store_failure_denies_page_action() {
    let store = MemoryPermissionStore::new();
    store.grant(5, Page::Supplier.function_id(), "1");
    store.set_failing(true);
    let service = service(&store);

    let err = service
        .require(&identity("EMP07", 5, false), SupplierAction::ViewList)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_idle_cache_entry_expires() {
    let store = MemoryPermissionStore::new();
    store.set_urls("EMP08", &["/Cus/MeterCheck/Index"]);
    let service = PermissionService::new(store.clone(), Duration::from_millis(100));
    let code = EmployeeCode::new("EMP08");

    service.allowed_urls(&code).await.unwrap();
    service.allowed_urls(&code).await.unwrap();
    assert_eq!(store.url_calls.load(Ordering::SeqCst), 1);

    // 闲置超过 TTL 后重新读取
    tokio::time::sleep(Duration::from_millis(300)).await;
    service.allowed_urls(&code).await.unwrap();
    assert_eq!(store.url_calls.load(Ordering::SeqCst), 2);
}
