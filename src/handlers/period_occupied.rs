use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::AppState,
    models::{occupancy::OccupancyQuery, page::PeriodOccupiedAction, role::Identity},
    services::occupancy_service::OccupancyCalendar,
};

/// 入住日历
pub async fn index(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<OccupancyQuery>,
) -> Result<Json<OccupancyCalendar>, AppError> {
    let perms = state
        .permission_service
        .require(&identity, PeriodOccupiedAction::View)
        .await?;

    let calendar = state
        .occupancy_service
        .calendar(
            &query,
            perms.allows(PeriodOccupiedAction::MakeShortTermReservation),
        )
        .await?;
    Ok(Json(calendar))
}
