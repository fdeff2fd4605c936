//! 测试公共模块
//! 提供测试配置、内存版应用和请求辅助函数

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use longevity_gateway::{
    auth::clock::ManualClock,
    db,
    config::{
        AppConfig, CookieConfig, CorsConfig, DatabaseConfig, LoggingConfig, SecurityConfig,
        ServerConfig, DEFAULT_ALLOWED_ORIGINS,
    },
    middleware::AppState,
    routes,
};
use secrecy::Secret;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "secret1";

/// 创建测试配置（低成本 Argon2 参数，内存存储）
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
        },
        database: DatabaseConfig {
            url: None,
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new("test-secret-key-for-testing-only-min-32-chars".to_string()),
            access_token_exp_secs: 3600,
            refresh_token_exp_secs: 7 * 24 * 3600,
            password_min_length: 6,
            password_hash_memory_kib: 1024,
            password_hash_iterations: 1,
            password_hash_parallelism: 1,
        },
        cors: CorsConfig {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        },
        cookies: CookieConfig {
            enabled: true,
            secure: false,
        },
    }
}

/// 连接测试数据库并清空数据
///
/// 未设置 `TEST_DATABASE_URL` 时返回 None，调用方跳过测试
pub async fn setup_test_db() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;

    let mut config = create_test_config();
    config.database.url = Some(Secret::new(url));

    let pool = db::create_pool(&config.database)
        .await
        .expect("Failed to create test database pool");

    // 运行迁移
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query("TRUNCATE TABLE token_blacklist, users")
        .execute(&pool)
        .await
        .expect("Failed to truncate test tables");

    Some(pool)
}

/// 固定起始时间的手动时钟
pub fn test_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
}

pub fn create_test_state(config: AppConfig, clock: &ManualClock) -> Arc<AppState> {
    Arc::new(AppState::in_memory(config, Arc::new(clock.clone())).expect("Failed to build state"))
}

/// 创建测试应用
pub fn create_test_app() -> (Router, ManualClock) {
    let clock = test_clock();
    let state = create_test_state(create_test_config(), &clock);
    (routes::create_router(state), clock)
}

/// 测试响应
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// 所有 Set-Cookie 头
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }
}

/// 发送请求
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> TestResponse {
    send_with_headers(app, method, uri, body, bearer, &[]).await
}

pub async fn send_with_headers(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
    extra_headers: &[(&str, &str)],
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        headers,
        body,
    }
}

/// 注册测试用户，返回响应体
pub async fn register_user(app: &Router, email: &str, password: &str) -> Value {
    let response = send(
        app,
        "POST",
        "/api/auth/register/",
        Some(json!({
            "email": email,
            "password": password,
            "first_name": "Ada",
            "last_name": "Lovelace"
        })),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "register failed: {}", response.body);
    response.body
}

/// 登录测试用户，返回响应
pub async fn login_user(app: &Router, email: &str, password: &str) -> TestResponse {
    send(
        app,
        "POST",
        "/api/auth/login/",
        Some(json!({ "email": email, "password": password })),
        None,
    )
    .await
}

/// 不校验签名地解出 JWT 载荷
pub fn decode_claims(token: &str) -> Value {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)
        .expect("token should decode")
        .claims
}
