use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::middleware::{auth_middleware, log_errors};
use crate::routes;

// 公开路由
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/health", get(routes::health::health))
}

// 网关推送的消息事件，需要认证
pub fn event_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/events/message", post(routes::events::receive_message))
        .layer(axum::middleware::from_fn_with_state(state, auth_middleware))
}

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes())
        .merge(event_routes(state.clone()));

    // 根路径不能 nest
    let base = state.config.api_base_uri.trim_end_matches('/').to_string();
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(&base, api)
    };

    router
        .layer(axum::middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
