//! 认证服务：注册、登录、令牌刷新、登出与个人资料

use crate::{
    auth::{jwt::JwtService, password::PasswordHasher},
    config::SecurityConfig,
    error::AppError,
    models::{
        auth::{AccessTokenResponse, AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest},
        user::{NewUser, User, UserChanges, UserResponse},
    },
    repository::{RevocationStore, UserRepository},
    services::validation::{self, EMAIL_EXISTS, EMAIL_TAKEN, INVALID_EMAIL},
};
use std::sync::Arc;
use uuid::Uuid;

fn record_event(event: &'static str, outcome: &'static str) {
    metrics::counter!("auth_events_total", "event" => event, "outcome" => outcome).increment(1);
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    revocations: Arc<dyn RevocationStore>,
    jwt_service: Arc<JwtService>,
    hasher: PasswordHasher,
    /// 未知账户登录时用于校验的哈希，使各种失败耗时一致
    dummy_hash: String,
    password_min_length: usize,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        revocations: Arc<dyn RevocationStore>,
        jwt_service: Arc<JwtService>,
        security: &SecurityConfig,
    ) -> Result<Self, AppError> {
        let hasher = PasswordHasher::from_config(security)?;
        let dummy_hash = hasher.hash(&Uuid::new_v4().to_string())?;

        Ok(Self {
            users,
            revocations,
            jwt_service,
            hasher,
            dummy_hash,
            password_min_length: security.password_min_length,
        })
    }

    /// 用户注册
    ///
    /// 所有校验在写入之前完成，失败时不会创建任何记录
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AppError> {
        let valid = validation::validate_registration(req, self.password_min_length)?;

        if self.users.exists_by_email(&valid.email).await? {
            record_event("register", "conflict");
            return Err(AppError::conflict(EMAIL_EXISTS));
        }

        let password_hash = self.hash_password(valid.password).await?;

        // 并发注册同一邮箱时由存储层返回冲突
        let user = self
            .users
            .create(NewUser {
                email: valid.email,
                password_hash,
                first_name: valid.first_name,
                last_name: valid.last_name,
                date_joined: self.jwt_service.clock().now(),
            })
            .await
            .map_err(|e| {
                if matches!(e, AppError::Conflict(_)) {
                    record_event("register", "conflict");
                }
                e
            })?;

        let tokens = self.jwt_service.generate_token_pair(&user.id)?;

        tracing::info!(user_id = %user.id, "User registered");
        record_event("register", "success");

        Ok(AuthResponse {
            access: tokens.access,
            refresh: tokens.refresh,
            user: UserResponse::from(user),
        })
    }

    /// 用户登录
    ///
    /// 用户不存在、密码错误或账户停用都返回同一个错误
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AppError> {
        let (email, password) = validation::validate_login(&req)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            // 仍然执行一次 Argon2 校验，避免通过响应时间探测账户是否存在
            let _ = self.verify_password(password, self.dummy_hash.clone()).await;
            tracing::info!("Login failed: unknown account");
            record_event("login", "failure");
            return Err(AppError::InvalidCredentials);
        };

        if let Err(e) = self.verify_password(password, user.password_hash.clone()).await {
            if matches!(e, AppError::InvalidCredentials) {
                tracing::info!(user_id = %user.id, "Login failed: wrong password");
                record_event("login", "failure");
            }
            return Err(e);
        }

        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login failed: inactive account");
            record_event("login", "failure");
            return Err(AppError::InvalidCredentials);
        }

        let tokens = self.jwt_service.generate_token_pair(&user.id)?;

        tracing::info!(user_id = %user.id, "User logged in");
        record_event("login", "success");

        Ok(AuthResponse {
            access: tokens.access,
            refresh: tokens.refresh,
            user: UserResponse::from(user),
        })
    }

    /// 刷新访问令牌（刷新令牌不轮换）
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessTokenResponse, AppError> {
        let claims = self.jwt_service.validate_refresh_token(refresh_token)?;

        // 检查令牌是否已被撤销
        if self.revocations.is_revoked(&claims.jti).await? {
            tracing::info!(jti = %claims.jti, "Refresh rejected: token revoked");
            record_event("refresh", "revoked");
            return Err(AppError::TokenInvalid);
        }

        let user_id = claims.user_id()?;
        match self.users.find_by_id(user_id).await? {
            Some(user) if user.is_active => {}
            _ => {
                tracing::info!(user_id = %user_id, "Refresh rejected: no active user");
                record_event("refresh", "failure");
                return Err(AppError::TokenInvalid);
            }
        }

        let access = self.jwt_service.generate_access_token(&user_id)?;
        record_event("refresh", "success");

        Ok(AccessTokenResponse { access })
    }

    /// 登出（撤销刷新令牌）
    ///
    /// 无效、过期或缺失的令牌直接忽略；重复登出同一令牌不报错
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<bool, AppError> {
        let Some(token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Ok(false);
        };

        let claims = match self.jwt_service.validate_refresh_token(token) {
            Ok(claims) => claims,
            Err(_) => {
                tracing::debug!("Logout with unusable refresh token ignored");
                return Ok(false);
            }
        };

        let user_id = claims.user_id()?;
        let revoked = self
            .revocations
            .revoke(&claims.jti, user_id, claims.expires_at())
            .await?;

        if revoked {
            tracing::info!(user_id = %user_id, jti = %claims.jti, "Refresh token revoked");
            record_event("logout", "success");
        }

        Ok(revoked)
    }

    /// 获取当前用户信息
    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        Ok(UserResponse::from(self.active_user(user_id).await?))
    }

    /// 更新当前用户信息（仅更新提供的字段）
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<UserResponse, AppError> {
        let user = self.active_user(user_id).await?;

        validation::check_name_length("First name", req.first_name.as_deref())?;
        validation::check_name_length("Last name", req.last_name.as_deref())?;

        let email = match req.email {
            Some(raw) => {
                let email = validation::normalize_email(&raw);
                if email == user.email {
                    None
                } else {
                    if !validation::is_valid_email(&email) {
                        return Err(AppError::validation(INVALID_EMAIL));
                    }
                    if self.users.exists_by_email(&email).await? {
                        return Err(AppError::conflict(EMAIL_TAKEN));
                    }
                    Some(email)
                }
            }
            None => None,
        };

        let changes = UserChanges {
            email,
            first_name: req.first_name,
            last_name: req.last_name,
        };

        if changes.is_empty() {
            return Ok(UserResponse::from(user));
        }

        let updated = self
            .users
            .update(user_id, &changes, self.jwt_service.clock().now())
            .await?
            .ok_or(AppError::UserNotFound)?;

        tracing::info!(user_id = %user_id, email_changed = changes.email.is_some(), "Profile updated");

        Ok(UserResponse::from(updated))
    }

    /// 清理已过期的黑名单记录
    pub async fn flush_expired_tokens(&self) -> Result<u64, AppError> {
        let purged = self
            .revocations
            .purge_expired(self.jwt_service.clock().now())
            .await?;

        tracing::info!(purged, "Expired blacklist entries flushed");
        Ok(purged)
    }

    async fn active_user(&self, user_id: Uuid) -> Result<User, AppError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if !user.is_active {
            return Err(AppError::UserInactive);
        }

        Ok(user)
    }

    /// Argon2 计算放到阻塞线程池
    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<(), AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }
}
