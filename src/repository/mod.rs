//! Storage seams for the auth gateway
//!
//! [`UserRepository`] owns user records and [`RevocationStore`] owns the refresh-token
//! blacklist. Each has a PostgreSQL implementation and an in-memory one.

use crate::{
    error::AppError,
    models::user::{NewUser, User, UserChanges},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod token_repo;
pub mod user_repo;

pub use memory::{InMemoryRevocationStore, InMemoryUserRepository};
pub use token_repo::PgRevocationStore;
pub use user_repo::PgUserRepository;

/// User persistence
///
/// `create` and `update` return [`AppError::Conflict`] when the email is already owned by
/// another user, so callers stay correct even when two writers race past `exists_by_email`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError>;

    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;

    /// Returns `None` when no user has this id
    async fn update(
        &self,
        id: Uuid,
        changes: &UserChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, AppError>;
}

/// Refresh-token blacklist keyed by `jti`
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Atomically insert if absent; `true` when this call revoked the token
    async fn revoke(
        &self,
        jti: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, AppError>;

    /// Drop entries whose token has expired by `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}
