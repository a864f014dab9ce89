//! Select2 下拉数据接口

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Local;
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::AppState,
    models::{
        common::SelectOption,
        lookup::{LookupQuery, LookupType},
        role::Identity,
    },
};

/// `GET /api/Lookup/{type}?term=`，仅要求登录
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    Path(kind): Path<String>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<Vec<SelectOption>>, AppError> {
    let kind: LookupType = kind.parse()?;
    let items = state
        .lookup_repo
        .search(kind, &query.pattern(), Local::now().date_naive())
        .await?;
    Ok(Json(items))
}
