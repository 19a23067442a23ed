//! Credential store adapter: repository traits plus the Postgres and
//! in-memory implementations.
//!
//! Components never hold a database handle themselves; they are handed one
//! of these trait objects at construction and the process entry point owns
//! the lifecycle.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use axum::async_trait;
use uuid::Uuid;

use crate::models::{NewToken, NewUser, User, UserUpdate, VerificationToken};

/// Failure from the credential store adapter.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    /// Unique-constraint violation (duplicate email).
    #[error("unique constraint violated")]
    Conflict,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Used by tests and non-database stores to model an unreachable backend.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Lookup and mutation of user rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Applies the set fields of `fields` to the user, returning the updated
    /// row. `StoreError::NotFound` if no such user exists.
    async fn update_user(&self, id: Uuid, fields: UserUpdate) -> Result<User, StoreError>;
}

/// Lookup and mutation of email-verification token rows.
#[async_trait]
pub trait VerificationTokenStore: Send + Sync {
    async fn find_token_by_email(
        &self,
        email: &str,
    ) -> Result<Option<VerificationToken>, StoreError>;

    async fn find_token_by_value(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, StoreError>;

    /// Inserts a token row. For a given email this replaces any existing row
    /// atomically, so two racing issuances cannot leave two live tokens.
    async fn create_token(&self, new_token: NewToken) -> Result<VerificationToken, StoreError>;

    /// Returns whether a row was actually removed. Deleting an id that no
    /// longer exists is not an error, it reports `false`.
    async fn delete_token(&self, id: Uuid) -> Result<bool, StoreError>;
}
