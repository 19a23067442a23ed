//! Issuance, lookup and consumption of email-verification tokens.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{NewToken, VerificationToken};
use crate::store::{StoreError, VerificationTokenStore};

/// Tokens are good for one hour from issuance.
pub const TOKEN_TTL: Duration = Duration::hours(1);

#[derive(Clone)]
pub struct VerificationTokenService {
    store: Arc<dyn VerificationTokenStore>,
}

impl VerificationTokenService {
    pub fn new(store: Arc<dyn VerificationTokenStore>) -> Self {
        Self { store }
    }

    /// Issues a fresh token for `email`, superseding any previous one.
    pub async fn issue(&self, email: &str) -> Result<VerificationToken, AuthError> {
        self.issue_at(email, OffsetDateTime::now_utc()).await
    }

    /// `issue` with an explicit clock.
    pub async fn issue_at(
        &self,
        email: &str,
        now: OffsetDateTime,
    ) -> Result<VerificationToken, AuthError> {
        // Delete-then-create keeps at most one live token per address. Two
        // racing issuances can interleave here; the store insert upserts
        // over email, so the table still ends with a single row.
        if let Some(existing) = self
            .store
            .find_token_by_email(email)
            .await
            .map_err(storage)?
        {
            self.store.delete_token(existing.id).await.map_err(storage)?;
        }
        let token = self
            .store
            .create_token(NewToken {
                email: email.to_string(),
                token: Uuid::new_v4().to_string(),
                expires_at: now + TOKEN_TTL,
            })
            .await
            .map_err(storage)?;
        debug!(email = %email, "verification token issued");
        Ok(token)
    }

    pub async fn lookup(&self, token: &str) -> Result<Option<VerificationToken>, AuthError> {
        self.store.find_token_by_value(token).await.map_err(storage)
    }

    /// Redeems `token` exactly once, returning the email it was issued for.
    pub async fn consume(&self, token: &str) -> Result<String, AuthError> {
        self.consume_at(token, OffsetDateTime::now_utc()).await
    }

    /// `consume` with an explicit clock.
    pub async fn consume_at(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<String, AuthError> {
        let Some(row) = self
            .store
            .find_token_by_value(token)
            .await
            .map_err(storage)?
        else {
            warn!("unknown verification token");
            return Err(AuthError::InvalidToken);
        };
        // Lazy expiry: the dead row stays until a later issuance replaces it.
        if now >= row.expires_at {
            warn!(email = %row.email, "verification token expired");
            return Err(AuthError::TokenExpired);
        }
        // The delete is the commit point. If a concurrent consume or a
        // reissue got there first, this token no longer counts.
        let deleted = self.store.delete_token(row.id).await.map_err(storage)?;
        if !deleted {
            warn!(email = %row.email, "verification token already redeemed");
            return Err(AuthError::InvalidToken);
        }
        debug!(email = %row.email, "verification token consumed");
        Ok(row.email)
    }
}

fn storage(err: StoreError) -> AuthError {
    error!(error = %err, "token store error");
    AuthError::Storage
}
