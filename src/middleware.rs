//! HTTP 中间件
//! 应用状态、请求追踪、跨域配置

use crate::{
    auth::{clock::Clock, jwt::JwtService},
    config::{AppConfig, CorsConfig},
    error::AppError,
    repository::{
        InMemoryRevocationStore, InMemoryUserRepository, PgRevocationStore, PgUserRepository,
        RevocationStore, UserRepository,
    },
    services::AuthService,
};
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 服务使用 Arc 包装，多个请求共享同一实例
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// 未配置数据库时为 None（使用内存存储）
    pub db: Option<PgPool>,
    pub auth_service: Arc<AuthService>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    /// 由存储实现与时钟组装应用状态
    pub fn new(
        config: AppConfig,
        db: Option<PgPool>,
        users: Arc<dyn UserRepository>,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::with_clock(&config, clock)?);
        let auth_service = Arc::new(AuthService::new(
            users,
            revocations,
            jwt_service.clone(),
            &config.security,
        )?);

        Ok(Self {
            config,
            db,
            auth_service,
            jwt_service,
        })
    }

    /// 使用 PostgreSQL 存储
    pub fn with_postgres(
        config: AppConfig,
        pool: PgPool,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let users = Arc::new(PgUserRepository::new(pool.clone()));
        let revocations = Arc::new(PgRevocationStore::new(pool.clone()));
        Self::new(config, Some(pool), users, revocations, clock)
    }

    /// 使用内存存储（开发与测试）
    pub fn in_memory(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        Self::new(
            config,
            None,
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryRevocationStore::new()),
            clock,
        )
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签使用静态字符串
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            "OPTIONS" => "OPTIONS",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        // 在响应头中返回追踪标识
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
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 跨域配置：允许前端携带凭证访问
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, "Invalid CORS origin ignored: {}", e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
