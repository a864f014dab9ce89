//! 短租合同列表与详情

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::grid_json;
use crate::{
    error::AppError,
    middleware::AppState,
    models::{contract::*, page::ShortTermContractAction as Action, role::Identity},
};

pub async fn index(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    let perms = state
        .permission_service
        .require(&identity, Action::ViewList)
        .await?;

    let lookups = state.contract_service.lookups().await?;
    Ok(Json(json!({
        "lookups": lookups,
        "canAdd": perms.allows(Action::Add),
    })))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<ContractSearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let perms = state
        .permission_service
        .require(&identity, Action::ViewList)
        .await?;

    let grid = state.contract_service.search_short_term(&perms, &req).await?;
    Ok(grid_json(grid))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<CancelRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require(&identity, Action::Cancel)
        .await?;

    state
        .contract_service
        .cancel(ContractKind::ShortTerm, req.contract_id, identity.employee_code.as_str())
        .await?;
    Ok(Json(json!({ "success": true, "message": "Contract cancelled." })))
}

/// 详情页：无 id 为新增，否则按模式查看或编辑
pub async fn detail(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<DetailQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mode = DetailMode::resolve(query.id, query.mode.as_deref());
    let perms = match mode {
        DetailMode::Add => state.permission_service.require(&identity, Action::Add).await?,
        DetailMode::Edit => state.permission_service.require(&identity, Action::Edit).await?,
        DetailMode::View => {
            state
                .permission_service
                .require_any(&identity, &[Action::View, Action::Edit])
                .await?
        }
    };

    let lookups = state
        .contract_service
        .detail_lookups(mode == DetailMode::Add)
        .await?;
    let can_save = match mode {
        DetailMode::Add => perms.allows(Action::Add),
        DetailMode::Edit => perms.allows(Action::Edit),
        DetailMode::View => false,
    };

    match (mode, query.id) {
        (DetailMode::Add, _) | (_, None) => {
            let defaults = state.contract_service.new_contract_defaults().await?;
            Ok(Json(json!({
                "mode": DetailMode::Add,
                "defaults": defaults,
                "lookups": lookups,
                "canSave": can_save,
            })))
        }
        (_, Some(id)) => {
            let detail = state.contract_service.short_term_detail(id).await?;
            Ok(Json(json!({
                "mode": mode,
                "detail": detail,
                "lookups": lookups,
                "canSave": can_save,
                "canAddService": perms.allows(Action::Add) || perms.allows(Action::Edit),
            })))
        }
    }
}

/// 保存：新合同需要新增权限，已有合同需要编辑权限
pub async fn save(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(form): Json<ShortTermContractForm>,
) -> Result<impl IntoResponse, AppError> {
    let action = if form.existing_id().is_some() {
        Action::Edit
    } else {
        Action::Add
    };
    state.permission_service.require(&identity, action).await?;

    let contract_id = state
        .contract_service
        .save_short_term(&form, identity.employee_code.as_str())
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Saved successfully.",
        "contractId": contract_id,
    })))
}

/// 公寓在日期区间内是否可用
pub async fn check_apartment_availability(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require_any(&identity, &[Action::Add, Action::Edit])
        .await?;

    let availability = state.contract_service.availability(&query).await?;
    Ok(Json(json!({ "result": availability.code() })))
}

pub async fn contract_services(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<ContractIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require_any(&identity, &[Action::View, Action::Edit])
        .await?;

    let services = state
        .contract_service
        .contract_services(query.contract_id)
        .await?;
    Ok(Json(json!({ "success": true, "data": services })))
}

pub async fn save_service(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(form): Json<ContractServiceForm>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require_any(&identity, &[Action::Add, Action::Edit])
        .await?;

    let id = state.contract_service.save_service(&form).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Service added.",
        "contractServiceId": id,
    })))
}

/// 代理公司的联系人
pub async fn agent_persons(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<CompanyIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require_any(&identity, &[Action::View, Action::Add, Action::Edit])
        .await?;

    let persons = state.contract_service.agent_persons(query.company_id).await?;
    Ok(Json(persons))
}
