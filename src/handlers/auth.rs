//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{
        auth::{
            AccessTokenResponse, AuthResponse, LoginRequest, LogoutRequest, MessageResponse,
            RefreshTokenRequest, RegisterRequest, UpdateProfileRequest,
        },
        user::UserResponse,
    },
    services::validation::REFRESH_REQUIRED,
};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar, SameSite},
    WithRejection,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub const COOKIE_ACCESS: &str = "access_token";
pub const COOKIE_REFRESH: &str = "refresh_token";
pub const LOGOUT_MESSAGE: &str = "Successfully logged out";

/// JSON 请求体，解析失败时返回 `{"error": ...}`
type JsonBody<T> = WithRejection<Json<T>, AppError>;

/// 可选的 JSON 请求体，空请求体按所有字段缺省处理
///
/// 仅携带 cookie 的浏览器请求可以不发送请求体
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|e| {
        AppError::Validation(format!("Failed to parse the request body as JSON: {}", e))
    })
}

/// httpOnly 令牌 cookie
fn token_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .build()
}

/// 请求体中没有令牌时回退到 cookie
fn refresh_from_body_or_cookie(body: Option<String>, jar: &CookieJar, use_cookie: bool) -> Option<String> {
    body.filter(|t| !t.is_empty()).or_else(|| {
        use_cookie
            .then(|| jar.get(COOKIE_REFRESH).map(|c| c.value().to_string()))
            .flatten()
    })
}

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(req), _): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(req), _): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let response = state.auth_service.login(req).await?;

    let cookies = &state.config.cookies;
    let jar = if cookies.enabled {
        jar.add(token_cookie(COOKIE_ACCESS, response.access.clone(), cookies.secure))
            .add(token_cookie(COOKIE_REFRESH, response.refresh.clone(), cookies.secure))
    } else {
        jar
    };

    Ok((jar, Json(response)))
}

/// 刷新访问令牌
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<AccessTokenResponse>), AppError> {
    let req: RefreshTokenRequest = optional_json(&body)?;
    let cookies = &state.config.cookies;
    let token = refresh_from_body_or_cookie(req.refresh, &jar, cookies.enabled)
        .ok_or_else(|| AppError::validation(REFRESH_REQUIRED))?;

    let response = state.auth_service.refresh(&token).await?;

    let jar = if cookies.enabled {
        jar.add(token_cookie(COOKIE_ACCESS, response.access.clone(), cookies.secure))
    } else {
        jar
    };

    Ok((jar, Json(response)))
}

/// 登出
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    // 登出总是成功，无法解析的请求体按未提供令牌处理
    let req: LogoutRequest = optional_json(&body).unwrap_or_default();
    let cookies = &state.config.cookies;
    let token = refresh_from_body_or_cookie(req.refresh, &jar, cookies.enabled);

    state.auth_service.logout(token.as_deref()).await?;

    let jar = if cookies.enabled {
        jar.remove(Cookie::build(COOKIE_ACCESS).path("/"))
            .remove(Cookie::build(COOKIE_REFRESH).path("/"))
    } else {
        jar
    };

    Ok((
        jar,
        Json(MessageResponse {
            message: LOGOUT_MESSAGE,
        }),
    ))
}

/// 获取当前用户信息
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.auth_service.get_profile(auth_context.user_id).await?;

    Ok(Json(user))
}

/// 更新当前用户信息
pub async fn update_current_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    WithRejection(Json(req), _): JsonBody<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .auth_service
        .update_profile(auth_context.user_id, req)
        .await?;

    Ok(Json(user))
}
