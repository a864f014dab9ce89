//! 请求权限网关
//!
//! 每个请求在会话解析之后、路由之前经过此中间件：
//! 公开路径直接放行；未登录的 API 返回 401，页面跳转登录；
//! 已登录的 API 与管理员放行；其余页面按缓存的 URL 白名单判断。

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::{error::AppError, middleware::AppState, models::role::Identity};

pub const LOGIN_PATH: &str = "/Login";
pub const ACCESS_DENIED_PATH: &str = "/AccessDenied";

/// 前缀匹配的公开路径
const PUBLIC_PREFIXES: &[&str] = &["/login", "/logout", "/dist", "/plugins"];

/// 精确匹配的公开路径
const PUBLIC_PATHS: &[&str] = &["/", "/index", "/accessdenied"];

/// 采用模块归属判断的页面
const MODULE_MEMBERSHIP_PAGES: &[&str] = &["stcontractdetail"];

/// 模块归属判断使用的固定目录。只适用于上面唯一的短租合同详情页，
/// 新增页面前需要改为按页面推导目录。
const MODULE_MEMBERSHIP_FOLDER: &str = "/sales/stcontract";

/// 网关判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allow,
    Unauthorized,
    RedirectToLogin,
    RedirectToAccessDenied,
}

/// 页面 URL 匹配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// 白名单中有同一模块目录下的任意 URL 即可
    ModuleMembership,
    /// 精确匹配，或者列表页（/index）授权其目录下的子路径
    ExactOrPrefix,
}

pub fn is_public_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    PUBLIC_PREFIXES.iter().any(|p| lower.starts_with(p)) || PUBLIC_PATHS.contains(&lower.as_str())
}

/// `/api` 本身或其下任意路径
pub fn is_api_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower == "/api" || lower.starts_with("/api/")
}

/// 去掉查询串、转小写、去掉末尾斜杠；空路径视为 `/index`
pub fn normalize_path(path: &str) -> String {
    let without_query = path.split('?').next().unwrap_or_default();
    let clean = without_query.to_lowercase().trim_end_matches('/').to_string();
    if clean.is_empty() {
        "/index".to_string()
    } else {
        clean
    }
}

pub fn strategy_for(clean_path: &str) -> MatchStrategy {
    if MODULE_MEMBERSHIP_PAGES.iter().any(|p| clean_path.contains(p)) {
        MatchStrategy::ModuleMembership
    } else {
        MatchStrategy::ExactOrPrefix
    }
}

/// 单条白名单 URL 是否覆盖请求路径（两者均已规范化）
pub fn url_matches(clean_path: &str, allowed: &str) -> bool {
    if clean_path == allowed {
        return true;
    }

    match allowed.strip_suffix("/index") {
        // 根目录的 /index 不授权任何子路径
        Some(base) if !base.is_empty() => {
            clean_path == base
                || clean_path
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
        _ => false,
    }
}

pub fn grants_access(clean_path: &str, allowed_urls: &[String]) -> bool {
    match strategy_for(clean_path) {
        MatchStrategy::ModuleMembership => allowed_urls
            .iter()
            .any(|u| u.contains(MODULE_MEMBERSHIP_FOLDER)),
        MatchStrategy::ExactOrPrefix => allowed_urls.iter().any(|u| url_matches(clean_path, u)),
    }
}

/// 对一个请求做出网关判定
pub async fn evaluate(state: &AppState, path: &str, identity: Option<&Identity>) -> GateOutcome {
    if is_public_path(path) {
        return GateOutcome::Allow;
    }

    let Some(identity) = identity else {
        return if is_api_path(path) {
            GateOutcome::Unauthorized
        } else {
            GateOutcome::RedirectToLogin
        };
    };

    if is_api_path(path) || identity.is_admin {
        return GateOutcome::Allow;
    }

    let clean = normalize_path(path);
    let allowed = match state
        .permission_service
        .allowed_urls(&identity.employee_code)
        .await
    {
        Ok(urls) => urls,
        Err(e) => {
            tracing::warn!(
                employee_code = %identity.employee_code,
                path = %clean,
                error = %e,
                "Permission lookup failed, denying page"
            );
            return GateOutcome::RedirectToAccessDenied;
        }
    };

    if grants_access(&clean, &allowed) {
        GateOutcome::Allow
    } else {
        tracing::warn!(
            employee_code = %identity.employee_code,
            path = %clean,
            "Page not in allowed URLs"
        );
        GateOutcome::RedirectToAccessDenied
    }
}

pub fn redirect_to(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// 权限网关中间件，需位于会话中间件之后
pub async fn permission_gate_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let identity = req.extensions().get::<Identity>().cloned();

    match evaluate(&state, &path, identity.as_ref()).await {
        GateOutcome::Allow => next.run(req).await,
        GateOutcome::Unauthorized => AppError::Unauthorized.into_response(),
        GateOutcome::RedirectToLogin => redirect_to(LOGIN_PATH),
        GateOutcome::RedirectToAccessDenied => redirect_to(ACCESS_DENIED_PATH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_public_paths() {
        for path in [
            "/Login",
            "/Login/Reset",
            "/Logout",
            "/dist/app.css",
            "/plugins/jquery/jquery.js",
            "/",
            "/Index",
            "/index",
            "/AccessDenied",
        ] {
            assert!(is_public_path(path), "{path} should be public");
        }

        for path in ["/Index/Other", "/Purchasing/Supplier/Index", "/api/Lookup/company"] {
            assert!(!is_public_path(path), "{path} should not be public");
        }

        // 纯前缀匹配
        assert!(is_public_path("/LoginHelp"));
    }

    #[test]
    fn test_api_paths() {
        assert!(is_api_path("/api/Lookup/company"));
        assert!(is_api_path("/API/anything"));
        assert!(is_api_path("/api"));
        assert!(!is_api_path("/apiary"));
        assert!(!is_api_path("/Sales/api"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/Purchasing/Supplier/Index/"), "/purchasing/supplier/index");
        assert_eq!(normalize_path("/Sales/STContract?x=1"), "/sales/stcontract");
        assert_eq!(normalize_path("/"), "/index");
        assert_eq!(normalize_path(""), "/index");
    }

    #[test]
    fn test_exact_and_prefix_matching() {
        let allowed = "/purchasing/supplier/index";
        assert!(url_matches("/purchasing/supplier/index", allowed));
        assert!(url_matches("/purchasing/supplier", allowed));
        assert!(url_matches("/purchasing/supplier/detail/7", allowed));
        assert!(!url_matches("/purchasing/supplierx", allowed));
        assert!(!url_matches("/purchasing/other/index", allowed));

        // 非 /index 结尾的 URL 只做精确匹配
        assert!(url_matches("/cus/meterupload", "/cus/meterupload"));
        assert!(!url_matches("/cus/meterupload/x", "/cus/meterupload"));

        // 根 /index 不授权子路径
        assert!(!url_matches("/purchasing/supplier/index", "/index"));
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            strategy_for("/sales/stcontract/stcontractdetail"),
            MatchStrategy::ModuleMembership
        );
        assert_eq!(strategy_for("/purchasing/supplier/detail/7"), MatchStrategy::ExactOrPrefix);
    }

    #[test]
    fn test_module_membership_uses_fixed_folder() {
        let path = "/sales/stcontract/stcontractdetail";
        assert!(grants_access(path, &urls(&["/sales/stcontract/print"])));
        assert!(grants_access(path, &urls(&["/sales/stcontract/index"])));
        assert!(!grants_access(path, &urls(&["/sales/longtermcontract/index"])));
        assert!(!grants_access(path, &[]));
    }

    #[test]
    fn test_detail_granted_by_list_page() {
        let allowed = urls(&["/purchasing/supplier/index"]);
        assert!(grants_access("/purchasing/supplier/detail/7", &allowed));
        assert!(!grants_access("/sales/longtermcontract/index", &allowed));
    }
}
