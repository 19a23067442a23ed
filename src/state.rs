use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::password::PasswordHasher;
use crate::auth::service::Authenticator;
use crate::auth::tokens::VerificationTokenService;
use crate::config::AppConfig;
use crate::mailer::{LogMailer, Mailer, ResendMailer};
use crate::store::{MemoryStore, PgStore, UserStore, VerificationTokenStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Authenticator,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, tokens): (Arc<dyn UserStore>, Arc<dyn VerificationTokenStore>) =
            match &config.database_url {
                Some(url) => {
                    let pool = sqlx::postgres::PgPoolOptions::new()
                        .max_connections(10)
                        .connect(url)
                        .await?;
                    // Run migrations if present
                    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                        warn!(error = %e, "migrations folder not found or migration failed; continuing");
                    }
                    let store = Arc::new(PgStore::new(pool));
                    (
                        store.clone() as Arc<dyn UserStore>,
                        store as Arc<dyn VerificationTokenStore>,
                    )
                }
                None => {
                    warn!("DATABASE_URL not set; credential data lives in memory only");
                    let store = Arc::new(MemoryStore::new());
                    (
                        store.clone() as Arc<dyn UserStore>,
                        store as Arc<dyn VerificationTokenStore>,
                    )
                }
            };

        let mailer: Arc<dyn Mailer> = match &config.resend_api_key {
            Some(key) => Arc::new(ResendMailer::new(key.clone(), config.mail_from.clone())),
            None => {
                warn!("RESEND_API_KEY not set; verification emails are logged only");
                Arc::new(LogMailer)
            }
        };

        info!(base_url = %config.base_url, "state initialized");
        Ok(Self::from_parts(config, users, tokens, mailer))
    }

    /// Assembles state from explicit collaborators. Tests use this with the
    /// in-memory store and a stub mailer.
    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn VerificationTokenStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let auth = Authenticator::new(
            users,
            VerificationTokenService::new(tokens),
            PasswordHasher::new(),
            mailer,
            config.base_url.clone(),
        );
        Self { config, auth }
    }

    /// Self-contained state over the in-memory store and the logging mailer.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            base_url: "http://localhost:8080".into(),
            session: crate::config::SessionConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
            },
            resend_api_key: None,
            mail_from: "onboarding@resend.dev".into(),
            routes: crate::guard::RoutePolicy::default(),
        });

        let store = Arc::new(MemoryStore::new());
        Self::from_parts(
            config,
            store.clone() as Arc<dyn UserStore>,
            store as Arc<dyn VerificationTokenStore>,
            Arc::new(LogMailer),
        )
    }
}
