//! In-memory stores for tests and database-less runs

use super::{RevocationStore, UserRepository};
use crate::{
    error::AppError,
    models::user::{NewUser, User, UserChanges},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct UserTable {
    by_id: HashMap<Uuid, User>,
    // email -> id
    by_email: HashMap<String, Uuid>,
}

/// User store behind a single lock so email uniqueness is checked and claimed atomically
#[derive(Default)]
pub struct InMemoryUserRepository {
    table: RwLock<UserTable>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the active flag; returns false when the user does not exist
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> bool {
        let mut table = self.table.write().await;
        match table.by_id.get_mut(&id) {
            Some(user) => {
                user.is_active = is_active;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let table = self.table.read().await;
        Ok(table
            .by_email
            .get(email)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.table.read().await.by_id.get(&id).cloned())
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.table.read().await.by_email.contains_key(email))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut table = self.table.write().await;
        if table.by_email.contains_key(&new_user.email) {
            return Err(AppError::conflict("User with this email already exists"));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            is_active: true,
            date_joined: new_user.date_joined,
            updated_at: new_user.date_joined,
        };

        table.by_email.insert(user.email.clone(), user.id);
        table.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &UserChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let mut table = self.table.write().await;
        let Some(current_email) = table.by_id.get(&id).map(|u| u.email.clone()) else {
            return Ok(None);
        };

        if let Some(email) = changes.email.as_ref().filter(|e| **e != current_email) {
            if table.by_email.contains_key(email) {
                return Err(AppError::conflict("Email already taken"));
            }
            table.by_email.remove(&current_email);
            table.by_email.insert(email.clone(), id);
        }

        let user = table
            .by_id
            .get_mut(&id)
            .ok_or_else(|| AppError::internal_error("user index out of sync"))?;
        changes.apply(user, at);
        Ok(Some(user.clone()))
    }
}

/// Refresh-token blacklist on a concurrent map
#[derive(Default)]
pub struct InMemoryRevocationStore {
    // jti -> (user id, token expiry)
    revoked: DashMap<String, (Uuid, DateTime<Utc>)>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(
        &self,
        jti: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.revoked.entry(jti.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert((user_id, expires_at));
                Ok(true)
            }
        }
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AppError> {
        Ok(self.revoked.contains_key(jti))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let before = self.revoked.len();
        self.revoked.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(before.saturating_sub(self.revoked.len()) as u64)
    }
}
