//! 抄表照片上传与核对

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Local;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppError,
    middleware::AppState,
    models::{meter::*, page::MeterReadingAction as Action, role::Identity},
};

/// 上传表单中的文件字段名
const UPLOAD_FIELD: &str = "uploadImage";

fn resolve_month(query: MonthQuery) -> Result<MeterMonth, AppError> {
    MeterMonth::resolve(query, Local::now().date_naive())
}

/// 上传页
pub async fn upload_page(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, AppError> {
    state.permission_service.require(&identity, Action::Upload).await?;

    let month = resolve_month(query)?;
    Ok(Json(json!({
        "month": month.month,
        "year": month.year,
        "maxUploadBytes": state.config.storage.max_upload_bytes,
    })))
}

/// 上传照片，表单字段 `uploadImage` 可出现多次
pub async fn upload(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<MonthQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    state.permission_service.require(&identity, Action::Upload).await?;

    let mut month_query = query;
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            UPLOAD_FIELD => {
                let file_name = field.file_name().unwrap_or("meter.jpg").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
                files.push((file_name, data.to_vec()));
            }
            "month" | "year" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
                let value = value.trim();
                if name == "month" {
                    month_query.month = value.parse().ok().or(month_query.month);
                } else {
                    month_query.year = value.parse().ok().or(month_query.year);
                }
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No file uploaded.".to_string()));
    }

    let month = resolve_month(month_query)?;
    let mut saved = Vec::with_capacity(files.len());
    for (original_name, data) in files {
        let file_name = state
            .meter_service
            .upload(month, identity.employee_code.as_str(), &original_name, data)
            .await?;
        saved.push(file_name);
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("Uploaded {} file(s).", saved.len()),
        "fileNames": saved,
    })))
}

/// 核对页：当月读数
pub async fn check_page(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, AppError> {
    let perms = state.permission_service.require(&identity, Action::View).await?;

    let month = resolve_month(query)?;
    let readings = state.meter_service.readings(month).await?;

    Ok(Json(json!({
        "month": month.month,
        "year": month.year,
        "readings": readings,
        "canRecognize": perms.allows(Action::Recognize),
        "canConfirm": perms.allows(Action::Confirm),
        "canSendEmail": perms.allows(Action::SendEmail),
    })))
}

pub async fn photo(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.permission_service.require(&identity, Action::View).await?;

    let bytes = state.meter_service.photo(id).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}

pub async fn recognize(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<RecognizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.permission_service.require(&identity, Action::Recognize).await?;

    let records = state.meter_service.recognize(&req.ids).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Recognized {} image(s).", records.len()),
        "records": records,
    })))
}

pub async fn update_all(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<UpdateAllRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.permission_service.require(&identity, Action::Confirm).await?;

    if req.records.is_empty() {
        return Err(AppError::BadRequest("No records to update.".to_string()));
    }

    let updated = state.meter_service.update_all(&req.records).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Updated {} records.", updated),
    })))
}

pub async fn send_email(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<SendEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.permission_service.require(&identity, Action::SendEmail).await?;

    req.validate()?;
    let month = resolve_month(MonthQuery {
        month: req.month,
        year: req.year,
    })?;

    state.meter_service.send_email(&req, month).await?;
    tracing::info!(
        employee_code = %identity.employee_code,
        file_name = %req.file_name,
        "Meter reading email sent"
    );
    Ok(Json(json!({ "success": true, "message": "Email sent." })))
}
