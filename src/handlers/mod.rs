//! HTTP 处理器模块

pub mod auth;
pub mod health;
pub mod long_term_contract;
pub mod lookup;
pub mod meter;
pub mod period_occupied;
pub mod short_term_contract;
pub mod supplier;

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::services::contract_service::ContractGrid;

/// 合同表格的统一响应格式
pub(crate) fn grid_json<A: Serialize>(grid: ContractGrid<A>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": grid.rows,
        "total": grid.total,
        "page": grid.page,
        "pageSize": grid.page_size,
        "totalPages": grid.total_pages,
    }))
}
