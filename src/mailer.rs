//! Verification email delivery.
//!
//! The authenticator only knows the `Mailer` trait. `ResendMailer` talks to
//! the Resend HTTP API; `LogMailer` is the local dev sender that logs the
//! link instead of sending real email.

use axum::async_trait;
use serde_json::json;
use tracing::{debug, info};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("email request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The delivery API answered with a non-success status.
    #[error("email rejected: {0}")]
    Rejected(String),
}

/// Link included in the verification email body.
pub fn verification_url(base_url: &str, token: &str) -> String {
    format!(
        "{}/email-verification?token={}",
        base_url.trim_end_matches('/'),
        token
    )
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, verification_url: &str) -> Result<(), MailError>;
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_verification(&self, to: &str, verification_url: &str) -> Result<(), MailError> {
        let body = json!({
            "from": self.from,
            "to": to,
            "subject": "Verify your email",
            "html": format!(
                r#"<p>Click <a href="{verification_url}">here</a> to verify your email</p>"#
            ),
        });
        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{status}: {detail}")));
        }
        debug!(to = %to, "verification email sent");
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, verification_url: &str) -> Result<(), MailError> {
        info!(to = %to, url = %verification_url, "verification email send stub");
        Ok(())
    }
}

/// Test sender that records every delivery.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification(&self, to: &str, verification_url: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), verification_url.to_string()));
        Ok(())
    }
}

/// Test sender whose deliveries always fail.
#[cfg(test)]
pub struct FailingMailer;

#[cfg(test)]
#[async_trait]
impl Mailer for FailingMailer {
    async fn send_verification(&self, _to: &str, _url: &str) -> Result<(), MailError> {
        Err(MailError::Rejected("delivery is down".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_url_joins_cleanly() {
        assert_eq!(
            verification_url("http://localhost:8080", "tok-1"),
            "http://localhost:8080/email-verification?token=tok-1"
        );
        assert_eq!(
            verification_url("https://app.example.com/", "tok-1"),
            "https://app.example.com/email-verification?token=tok-1"
        );
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mailer = LogMailer;
        assert!(mailer
            .send_verification("jane@example.com", "http://localhost/x")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn recording_mailer_captures_deliveries() {
        let mailer = RecordingMailer::default();
        mailer
            .send_verification("jane@example.com", "http://localhost/x")
            .await
            .unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "jane@example.com");
    }
}
