//! HTTP 中间件与应用状态

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::JwtService,
    config::AppConfig,
    error::AppError,
    repository::{
        ContractRepository, EmployeeRepository, LookupRepository, MeterRepository,
        OccupancyRepository, PermissionStore, SupplierRepository,
    },
    services::{
        mail_service::Mailer, ocr_service::TextRecognizer, AuthService, ContractService,
        MenuService, MeterService, OccupancyService, PermissionService, SupplierService,
    },
};

/// 应用状态，所有请求共享
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: sqlx::PgPool,
    pub jwt_service: Arc<JwtService>,
    pub permission_service: Arc<PermissionService>,
    pub auth_service: Arc<AuthService>,
    pub menu_service: Arc<MenuService>,
    pub lookup_repo: Arc<LookupRepository>,
    pub supplier_service: Arc<SupplierService>,
    pub contract_service: Arc<ContractService>,
    pub occupancy_service: Arc<OccupancyService>,
    pub meter_service: Arc<MeterService>,
}

impl AppState {
    /// 组装全部服务；权限存储、识别客户端和邮件发送器由调用方注入
    pub fn new(
        config: AppConfig,
        db: sqlx::PgPool,
        permission_store: Arc<dyn PermissionStore>,
        recognizer: Arc<dyn TextRecognizer>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::from_config(&config)?);
        let permission_service = Arc::new(PermissionService::new(
            permission_store,
            config.security.permission_cache_ttl(),
        ));

        let meter_service = MeterService::new(
            MeterRepository::new(db.clone()),
            recognizer,
            mailer,
            config.storage.upload_root.clone(),
            config.ocr.batch_size,
        );

        Ok(Self {
            auth_service: Arc::new(AuthService::new(
                EmployeeRepository::new(db.clone()),
                jwt_service.clone(),
            )),
            menu_service: Arc::new(MenuService::new(EmployeeRepository::new(db.clone()))),
            lookup_repo: Arc::new(LookupRepository::new(db.clone())),
            supplier_service: Arc::new(SupplierService::new(SupplierRepository::new(db.clone()))),
            contract_service: Arc::new(ContractService::new(ContractRepository::new(db.clone()))),
            occupancy_service: Arc::new(OccupancyService::new(OccupancyRepository::new(db.clone()))),
            meter_service: Arc::new(meter_service),
            jwt_service,
            permission_service,
            config,
            db,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        let status_class = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };
        metrics::counter!(
            "http_requests_total",
            "method" => method.to_string(),
            "status" => status_class
        )
        .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            path = %path,
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "abc-123".parse().unwrap());
        assert_eq!(extract_or_generate_trace_id(&headers), "abc-123");
    }

    #[test]
    fn test_trace_id_generated_when_missing() {
        let headers = HeaderMap::new();
        let id = extract_or_generate_trace_id(&headers);
        assert!(Uuid::parse_str(&id).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "   ".parse().unwrap());
        assert!(Uuid::parse_str(&extract_or_generate_trace_id(&headers)).is_ok());
    }
}
