//! 路由注册
//! 创建所有页面与 API 路由并应用中间件

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::{path::Path, sync::Arc};
use tower_http::{compression::CompressionLayer, services::ServeDir};

use crate::{
    auth::{permission_gate_middleware, session_middleware},
    handlers,
    middleware::{request_tracking_middleware, AppState},
};

fn supplier_routes() -> Router<Arc<AppState>> {
    use handlers::supplier::*;

    Router::new()
        .route("/Purchasing/Supplier/Index", get(index))
        .route("/Purchasing/Supplier/Index/Export", get(export))
        .route("/Purchasing/Supplier/Index/CopyYear", post(copy_year))
        .route("/Purchasing/Supplier/Index/Submit", post(submit))
        .route("/Purchasing/Supplier/Detail", get(new_form))
        .route("/Purchasing/Supplier/Detail/Save", post(save))
        .route("/Purchasing/Supplier/Detail/CheckSupplierCode", get(check_code))
        .route("/Purchasing/Supplier/Detail/SuggestSupplierCode", get(suggest_code))
        .route("/Purchasing/Supplier/Detail/{id}", get(detail))
        .route("/Purchasing/Supplier/Detail/{id}/SubmitApproval", post(submit_approval))
}

fn contract_routes() -> Router<Arc<AppState>> {
    use handlers::{long_term_contract as lt, short_term_contract as st};

    Router::new()
        .route("/Sales/LongTermContract/Index", get(lt::index))
        .route("/Sales/LongTermContract/Index/Search", post(lt::search))
        .route("/Sales/LongTermContract/Index/Cancel", post(lt::cancel))
        .route("/Sales/STContract/Index", get(st::index))
        .route("/Sales/STContract/Index/Search", post(st::search))
        .route("/Sales/STContract/Index/Cancel", post(st::cancel))
        .route("/Sales/STContract/STContractDetail", get(st::detail).post(st::save))
        .route(
            "/Sales/STContract/STContractDetail/CheckApmtAvail",
            get(st::check_apartment_availability),
        )
        .route(
            "/Sales/STContract/STContractDetail/ContractServices",
            get(st::contract_services),
        )
        .route("/Sales/STContract/STContractDetail/SaveService", post(st::save_service))
        .route("/Sales/STContract/STContractDetail/AgentPersons", get(st::agent_persons))
}

fn meter_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    use handlers::meter::*;

    Router::new()
        .route("/Cus/MeterUpload/Index", get(upload_page))
        .route(
            "/Cus/MeterUpload/Upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/Cus/MeterCheck/Index", get(check_page))
        .route("/Cus/MeterCheck/Photo/{id}", get(photo))
        .route("/Cus/MeterCheck/Recognize", post(recognize))
        .route("/Cus/MeterCheck/UpdateAll", post(update_all))
        .route("/Cus/MeterCheck/SendEmail", post(send_email))
}

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 健康检查不经过会话与权限网关
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    let static_root = Path::new(&state.config.storage.static_root);
    let static_routes = Router::new()
        .nest_service("/dist", ServeDir::new(static_root.join("dist")))
        .nest_service("/plugins", ServeDir::new(static_root.join("plugins")));

    // 会话中间件最后添加，因此先于权限网关执行
    let gated_routes = Router::new()
        .route("/", get(handlers::auth::home))
        .route("/Index", get(handlers::auth::home))
        .route(
            "/Login",
            get(handlers::auth::login_page).post(handlers::auth::login),
        )
        .route("/Logout", get(handlers::auth::logout))
        .route("/AccessDenied", get(handlers::auth::access_denied))
        .route("/api/Lookup/{kind}", get(handlers::lookup::lookup))
        .merge(supplier_routes())
        .merge(contract_routes())
        .route(
            "/Infor/PeriodOccupied/Index",
            get(handlers::period_occupied::index),
        )
        .merge(meter_routes(state.config.storage.max_upload_bytes))
        .layer(from_fn_with_state(state.clone(), permission_gate_middleware))
        .layer(from_fn_with_state(state.clone(), session_middleware));

    Router::new()
        .merge(public_routes)
        .merge(static_routes)
        .merge(gated_routes)
        .layer(CompressionLayer::new())
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}
