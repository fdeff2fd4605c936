//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    http::Uri,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{error::AppError, handlers, middleware::AppState};

/// 请求体大小上限
const MAX_BODY_BYTES: usize = 64 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证路由（无需认证）
    let auth_routes = Router::new()
        .route("/api/auth/login/", post(handlers::auth::login))
        .route("/api/auth/register/", post(handlers::auth::register))
        .route("/api/auth/refresh/", post(handlers::auth::refresh_token))
        .route("/api/auth/logout/", post(handlers::auth::logout));

    // 需要访问令牌的路由
    let authenticated_routes = Router::new()
        .route("/api/auth/user/", get(handlers::auth::get_current_user))
        .route("/api/auth/user/update/", put(handlers::auth::update_current_user))
        .layer(axum::middleware::from_fn_with_state(
            state.jwt_service.clone(),
            crate::auth::middleware::jwt_auth_middleware,
        ));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(crate::middleware::cors_layer(&state.config.cors))
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}

/// 未匹配的路由
async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
