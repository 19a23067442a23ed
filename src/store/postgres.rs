//! sqlx-backed store implementation.

use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreError, UserStore, VerificationTokenStore};
use crate::models::{NewToken, NewUser, User, UserUpdate, VerificationToken};

/// Postgres store. Cheap to clone; every clone shares the pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Postgres error code 23505, raised when an insert collides with a
/// unique index.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code == "23505"),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, email_verified_at, image, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, password_hash, email_verified_at, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, name, password_hash, email_verified_at, image, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(new_user.email_verified_at)
        .bind(&new_user.image)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::Conflict
            } else {
                StoreError::from(err)
            }
        })?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, fields: UserUpdate) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                image = COALESCE($3, image),
                email_verified_at = COALESCE($4, email_verified_at)
            WHERE id = $1
            RETURNING id, email, name, password_hash, email_verified_at, image, created_at
            "#,
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.image)
        .bind(fields.email_verified_at)
        .fetch_optional(&self.pool)
        .await?;
        user.ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl VerificationTokenStore for PgStore {
    async fn find_token_by_email(
        &self,
        email: &str,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let token = sqlx::query_as::<_, VerificationToken>(
            r#"
            SELECT id, email, token, expires_at, created_at
            FROM verification_tokens
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn find_token_by_value(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let token = sqlx::query_as::<_, VerificationToken>(
            r#"
            SELECT id, email, token, expires_at, created_at
            FROM verification_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn create_token(&self, new_token: NewToken) -> Result<VerificationToken, StoreError> {
        // The upsert leans on the unique index over email: a racing issuance
        // for the same address lands on DO UPDATE instead of duplicating.
        let token = sqlx::query_as::<_, VerificationToken>(
            r#"
            INSERT INTO verification_tokens (id, email, token, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at
            RETURNING id, email, token, expires_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_token.email)
        .bind(&new_token.token)
        .bind(new_token.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(token)
    }

    async fn delete_token(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
