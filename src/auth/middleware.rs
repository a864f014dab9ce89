//! 会话中间件
//! 从 Authorization 头或会话 Cookie 中解析会话，附加 Identity 到请求扩展

use crate::{error::AppError, middleware::AppState, models::role::Identity};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::{convert::Infallible, sync::Arc};

// 实现 FromRequestParts 以便在 handler 中直接提取 Identity
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

// 未登录也可访问的页面使用 Option<Identity>
impl<S> OptionalFromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().cloned())
    }
}

/// 从 Authorization 头提取 Bearer 令牌
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 从 Cookie 头提取会话令牌
pub fn extract_session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

/// 会话中间件：令牌有效时附加 Identity，本身从不拒绝请求
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_token(req.headers()).or_else(|| {
        extract_session_cookie(req.headers(), &state.config.security.session_cookie_name)
    });

    if let Some(token) = token {
        match state.jwt_service.validate_session(&token) {
            Ok(claims) => {
                let identity = claims.identity();
                tracing::debug!(employee_code = %identity.employee_code, "Session resolved");
                req.extensions_mut().insert(identity);
            }
            Err(_) => tracing::debug!("Ignoring invalid session token"),
        }
    }

    next.run(req).await
}
