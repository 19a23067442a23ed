use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Stored normalized: trimmed and lowercased.
    pub email: String,
    pub name: String,
    /// None for accounts created through an external identity provider.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub email_verified_at: Option<OffsetDateTime>,
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Whether the user can authenticate with a password at all.
    pub fn has_credentials(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Fields for creating a user row. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub email_verified_at: Option<OffsetDateTime>,
    pub image: Option<String>,
}

/// Partial update applied to an existing user. `None` leaves a field as is.
///
/// There is deliberately no way to clear `email_verified_at` (it is set once,
/// never removed) and no way to touch `password_hash` (set only at credential
/// registration).
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub image: Option<String>,
    pub email_verified_at: Option<OffsetDateTime>,
}

impl UserUpdate {
    pub fn verified_at(ts: OffsetDateTime) -> Self {
        Self {
            email_verified_at: Some(ts),
            ..Self::default()
        }
    }
}

/// Single-use email-verification token row.
///
/// `email` is intentionally not a foreign key onto `users`: a token may be
/// issued while the matching user row is still settling.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VerificationToken {
    pub id: Uuid,
    pub email: String,
    /// Opaque random value delivered in the verification link.
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields for creating a token row. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub email: String,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Public part of the user returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser::from(&user)
    }
}

/// Authenticated identity handed over by the external identity-provider
/// client after a completed OAuth handshake. The core never talks to the
/// provider itself; it only consumes this.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalIdentity {
    /// Provider-side account id, kept for logging only.
    pub id: String,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
}
