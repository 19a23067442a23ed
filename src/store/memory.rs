//! In-memory store backed by a mutex, used by tests and by local runs
//! without a `DATABASE_URL`.
//!
//! Mirrors the Postgres semantics that callers depend on: duplicate emails
//! conflict, and a token insert replaces any earlier row for the same email.

use std::sync::{Mutex, PoisonError};

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{StoreError, UserStore, VerificationTokenStore};
use crate::models::{NewToken, NewUser, User, UserUpdate, VerificationToken};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    tokens: Vec<VerificationToken>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.lock();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            name: new_user.name,
            password_hash: new_user.password_hash,
            email_verified_at: new_user.email_verified_at,
            image: new_user.image,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, fields: UserUpdate) -> Result<User, StoreError> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(name) = fields.name {
            user.name = name;
        }
        if let Some(image) = fields.image {
            user.image = Some(image);
        }
        if let Some(verified_at) = fields.email_verified_at {
            user.email_verified_at = Some(verified_at);
        }
        Ok(user.clone())
    }
}

#[async_trait]
impl VerificationTokenStore for MemoryStore {
    async fn find_token_by_email(
        &self,
        email: &str,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let inner = self.lock();
        Ok(inner.tokens.iter().find(|t| t.email == email).cloned())
    }

    async fn find_token_by_value(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let inner = self.lock();
        Ok(inner.tokens.iter().find(|t| t.token == token).cloned())
    }

    async fn create_token(&self, new_token: NewToken) -> Result<VerificationToken, StoreError> {
        let mut inner = self.lock();
        inner.tokens.retain(|t| t.email != new_token.email);
        let token = VerificationToken {
            id: Uuid::new_v4(),
            email: new_token.email,
            token: new_token.token,
            expires_at: new_token.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.tokens.push(token.clone());
        Ok(token)
    }

    async fn delete_token(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let before = inner.tokens.len();
        inner.tokens.retain(|t| t.id != id);
        Ok(inner.tokens.len() < before)
    }
}
