//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

pub const TOKEN_NOT_VALID_DETAIL: &str = "Given token not valid for any token type";
pub const TOKEN_NOT_VALID_CODE: &str = "token_not_valid";
pub const INVALID_CREDENTIALS_DETAIL: &str = "No active account found with the given credentials";
pub const NOT_AUTHENTICATED_DETAIL: &str = "Authentication credentials were not provided.";

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// 请求参数缺失或格式错误
    #[error("Validation error: {0}")]
    Validation(String),

    /// 唯一性冲突（例如邮箱已被占用）
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication credentials were not provided")]
    NotAuthenticated,

    #[error("Token not valid")]
    TokenInvalid,

    #[error("User not found")]
    UserNotFound,

    #[error("User is inactive")]
    UserInactive,

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::NotAuthenticated
            | AppError::TokenInvalid
            | AppError::UserNotFound
            | AppError::UserInactive => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    /// 构造响应体（不包含敏感信息）
    pub fn body(&self) -> ErrorBody {
        match self {
            AppError::Validation(msg) | AppError::Conflict(msg) => ErrorBody::message(msg),
            AppError::InvalidCredentials => ErrorBody::detail(INVALID_CREDENTIALS_DETAIL, None),
            AppError::NotAuthenticated => ErrorBody::detail(NOT_AUTHENTICATED_DETAIL, None),
            AppError::TokenInvalid => {
                ErrorBody::detail(TOKEN_NOT_VALID_DETAIL, Some(TOKEN_NOT_VALID_CODE))
            }
            AppError::UserNotFound => ErrorBody::detail("User not found", Some("user_not_found")),
            AppError::UserInactive => ErrorBody::detail("User is inactive", Some("user_inactive")),
            AppError::Forbidden => {
                ErrorBody::detail("You do not have permission to perform this action.", None)
            }
            AppError::NotFound(_) => ErrorBody::detail("Not found.", None),
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                ErrorBody::message("Internal server error")
            }
        }
    }

    // 便捷方法
    pub fn validation(msg: &str) -> Self {
        AppError::Validation(msg.to_string())
    }

    pub fn conflict(msg: &str) -> Self {
        AppError::Conflict(msg.to_string())
    }

    pub fn internal_error(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

/// 错误响应体
///
/// 校验类错误使用 `{"error": ...}`，认证类错误使用 `{"detail": ..., "code": ...}`
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ErrorBody {
    Message {
        error: String,
    },
    Detail {
        detail: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ErrorBody {
    fn message(msg: &str) -> Self {
        ErrorBody::Message {
            error: msg.to_string(),
        }
    }

    fn detail(detail: &str, code: Option<&str>) -> Self {
        ErrorBody::Detail {
            detail: detail.to_string(),
            code: code.map(str::to_string),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 服务端错误记录完整信息，客户端错误只记录调试日志
        if status.is_server_error() {
            tracing::error!(code = self.code(), message = %self, "Application error");
        } else {
            tracing::debug!(code = self.code(), message = %self, "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

/// 请求体 JSON 解析失败
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}
