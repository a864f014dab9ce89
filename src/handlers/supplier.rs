//! 供应商列表与详情
//!
//! 每个处理器先检查页面权限，再解析数据范围，最后才读取数据。

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppError,
    middleware::AppState,
    models::{page::SupplierAction, role::Identity, supplier::*},
};

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    pub view_mode: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CheckCodeQuery {
    #[serde(default)]
    pub code: String,
    pub supplier_id: Option<i32>,
}

/// 列表页
pub async fn index(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<SupplierFilterQuery>,
) -> Result<impl IntoResponse, AppError> {
    let perms = state
        .permission_service
        .require(&identity, SupplierAction::ViewList)
        .await?;
    let scope = state.permission_service.data_scope(&identity).await?;

    let listing = state.supplier_service.list(&scope, &query).await?;
    let lookups = state.supplier_service.lookups(&scope).await?;

    Ok(Json(json!({
        "listing": listing,
        "lookups": lookups,
        "isRestricted": scope.is_restricted(),
        "canViewDetail": perms.allows(SupplierAction::ViewDetail),
        "canAdd": perms.allows(SupplierAction::Add),
        "canEdit": perms.allows(SupplierAction::Edit),
        "canSubmit": perms.allows(SupplierAction::Submit),
        "canCopyToYear": perms.allows(SupplierAction::CopyToYear),
    })))
}

/// 导出 CSV
pub async fn export(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<SupplierFilterQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require(&identity, SupplierAction::ViewList)
        .await?;
    let scope = state.permission_service.data_scope(&identity).await?;

    let csv = state.supplier_service.export_csv(&scope, &query).await?;
    let file_name = format!(
        "Suppliers_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        csv,
    ))
}

/// 复制到年度
pub async fn copy_year(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<CopyYearRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require(&identity, SupplierAction::CopyToYear)
        .await?;
    let scope = state.permission_service.data_scope(&identity).await?;

    let message = state.supplier_service.copy_to_year(&scope, &req).await?;
    Ok(Json(json!({ "success": true, "message": message })))
}

/// 批量提交
pub async fn submit(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require(&identity, SupplierAction::Submit)
        .await?;
    let scope = state.permission_service.data_scope(&identity).await?;

    let summary = state.supplier_service.submit(&scope, &req).await?;
    Ok(Json(json!({
        "success": true,
        "message": summary.message(),
        "summary": summary,
    })))
}

/// 详情
pub async fn detail(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<i32>,
    Query(params): Query<DetailParams>,
) -> Result<impl IntoResponse, AppError> {
    let perms = state
        .permission_service
        .require(&identity, SupplierAction::ViewDetail)
        .await?;
    let scope = state.permission_service.data_scope(&identity).await?;

    let mode = ViewMode::from_query(params.view_mode.as_deref());
    let view = state
        .supplier_service
        .detail(&scope, id, mode, params.year)
        .await?;

    Ok(Json(json!({
        "detail": view,
        "canEdit": mode == ViewMode::Current && perms.allows(SupplierAction::Edit),
        "canSubmit": mode == ViewMode::Current && perms.allows(SupplierAction::Submit),
    })))
}

/// 新建表单
pub async fn new_form(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require(&identity, SupplierAction::Add)
        .await?;
    let scope = state.permission_service.data_scope(&identity).await?;
    // 受限用户默认本部门，未分配部门直接拒绝
    let dept_id = scope.department_filter(None)?;

    let code = state.supplier_service.suggested_code().await?;
    let lookups = state.supplier_service.lookups(&scope).await?;

    Ok(Json(json!({
        "supplierCode": code,
        "deptId": dept_id,
        "status": STATUS_PREPARING,
        "lookups": lookups,
    })))
}

/// 保存：无 id 需要新增权限，有 id 需要编辑权限
pub async fn save(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(form): Json<SupplierForm>,
) -> Result<impl IntoResponse, AppError> {
    let action = if form.existing_id().is_some() {
        SupplierAction::Edit
    } else {
        SupplierAction::Add
    };
    state.permission_service.require(&identity, action).await?;
    let scope = state.permission_service.data_scope(&identity).await?;

    form.validate()?;
    let id = state
        .supplier_service
        .save(&scope, &form, identity.employee_code.as_str())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Saved successfully.",
        "supplierId": id,
    })))
}

pub async fn submit_approval(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require(&identity, SupplierAction::Submit)
        .await?;
    let scope = state.permission_service.data_scope(&identity).await?;

    state
        .supplier_service
        .submit_approval(&scope, id, identity.employee_code.as_str())
        .await?;

    Ok(Json(json!({ "success": true, "message": "Submitted for approval." })))
}

/// 供应商编码是否已存在
pub async fn check_code(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<CheckCodeQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require_any(&identity, &[SupplierAction::ViewDetail, SupplierAction::Add])
        .await?;

    let exists = state
        .supplier_service
        .code_exists(&query.code, query.supplier_id)
        .await?;
    Ok(Json(json!({ "exists": exists })))
}

pub async fn suggest_code(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require(&identity, SupplierAction::Add)
        .await?;

    let code = state.supplier_service.suggested_code().await?;
    Ok(Json(json!({ "code": code })))
}
