//! 登录、登出、首页与拒绝访问页

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    auth::permission_gate::{redirect_to, LOGIN_PATH},
    error::AppError,
    middleware::AppState,
    models::{
        auth::{LoginForm, LoginPage},
        role::Identity,
    },
};

const HOME_PATH: &str = "/Index";

fn session_cookie(name: &str, value: &str, max_age_secs: u64) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age_secs
    ))
    .map_err(|e| AppError::Internal(format!("Invalid session cookie: {}", e)))
}

/// 登录页
pub async fn login_page(identity: Option<Identity>) -> Response {
    if identity.is_some() {
        return redirect_to(HOME_PATH);
    }
    Json(LoginPage {
        title: "Login",
        error_message: None,
    })
    .into_response()
}

/// 登录：校验账号密码，写入会话 Cookie 并跳转首页
pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let session = state.auth_service.login(&form).await?;

    let cookie = session_cookie(
        &state.config.security.session_cookie_name,
        &session.token,
        session.max_age_secs,
    )?;

    let mut response = redirect_to(HOME_PATH);
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// 登出：清除 Cookie 并回到登录页
pub async fn logout(
    State(state): State<Arc<AppState>>,
    identity: Option<Identity>,
) -> Result<Response, AppError> {
    if let Some(identity) = identity {
        tracing::info!(employee_code = %identity.employee_code, "Logout");
    }

    let cookie = session_cookie(&state.config.security.session_cookie_name, "", 0)?;
    let mut response = redirect_to(LOGIN_PATH);
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// 首页：返回当前用户的菜单
pub async fn home(
    State(state): State<Arc<AppState>>,
    identity: Option<Identity>,
) -> Result<Response, AppError> {
    let Some(identity) = identity else {
        return Ok(redirect_to(LOGIN_PATH));
    };

    let menu = state.menu_service.menu_for(&identity).await?;

    Ok(Json(json!({
        "employeeCode": identity.employee_code,
        "fullName": identity.full_name,
        "isAdmin": identity.is_admin,
        "menu": menu,
    }))
    .into_response())
}

pub async fn access_denied() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "ok": false,
            "title": "Access Denied",
            "message": "You do not have permission to access this page."
        })),
    )
}
