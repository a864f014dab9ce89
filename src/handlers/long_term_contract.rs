//! 长租合同列表

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use super::grid_json;
use crate::{
    error::AppError,
    middleware::AppState,
    models::{
        contract::{CancelRequest, ContractKind, ContractSearchRequest},
        page::LongTermContractAction,
        role::Identity,
    },
};

pub async fn index(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    let perms = state
        .permission_service
        .require(&identity, LongTermContractAction::ViewList)
        .await?;

    let lookups = state.contract_service.lookups().await?;
    Ok(Json(json!({
        "lookups": lookups,
        "canAdd": perms.allows(LongTermContractAction::Add),
    })))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<ContractSearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let perms = state
        .permission_service
        .require(&identity, LongTermContractAction::ViewList)
        .await?;

    let grid = state.contract_service.search_long_term(&perms, &req).await?;
    Ok(grid_json(grid))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<CancelRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require(&identity, LongTermContractAction::Cancel)
        .await?;

    state
        .contract_service
        .cancel(ContractKind::LongTerm, req.contract_id, identity.employee_code.as_str())
        .await?;
    Ok(Json(json!({ "success": true, "message": "Contract cancelled." })))
}
