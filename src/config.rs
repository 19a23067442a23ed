use serde::Deserialize;

use crate::guard::RoutePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Unset means the in-memory store, for local runs without Postgres.
    pub database_url: Option<String>,
    /// Base URL baked into verification links.
    pub base_url: String,
    pub session: SessionConfig,
    /// Unset means verification emails are logged instead of delivered.
    pub resend_api_key: Option<String>,
    pub mail_from: String,
    pub routes: RoutePolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "gatehouse".into()),
            audience: std::env::var("SESSION_AUDIENCE")
                .unwrap_or_else(|_| "gatehouse-users".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
        };
        let resend_api_key = std::env::var("RESEND_API_KEY").ok();
        let mail_from =
            std::env::var("MAIL_FROM").unwrap_or_else(|_| "onboarding@resend.dev".into());

        let mut routes = RoutePolicy::default();
        if let Ok(target) = std::env::var("POST_LOGIN_REDIRECT") {
            routes.post_login_target = target;
        }

        Ok(Self {
            database_url,
            base_url,
            session,
            resend_api_key,
            mail_from,
            routes,
        })
    }
}
