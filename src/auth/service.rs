//! Credential authenticator: the login state machine, registration, email
//! verification and external-identity linkage.
//!
//! All collaborators are injected: stores behind their traits, the hasher,
//! the mailer. The authenticator holds no handle to any global resource.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::auth::password::PasswordHasher;
use crate::auth::session::SessionClaims;
use crate::auth::tokens::VerificationTokenService;
use crate::auth::validate::{LoginInput, RegisterInput};
use crate::error::AuthError;
use crate::mailer::{self, Mailer};
use crate::models::{ExternalIdentity, NewUser, User, UserUpdate};
use crate::store::{StoreError, UserStore};

/// Outcome of a login attempt that did not fail.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Credentials check out and the email is verified.
    Authenticated(User),
    /// Credentials check out but the email is unverified: a fresh
    /// verification token was issued and mailed. Not an error, but no
    /// session may be established.
    VerificationPending { email: String },
}

/// Successful registration: the account exists, unverified, and the
/// verification email is on its way. Registration never signs the user in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationPending {
    pub email: String,
}

#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
    tokens: VerificationTokenService,
    hasher: PasswordHasher,
    mailer: Arc<dyn Mailer>,
    base_url: String,
}

impl Authenticator {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: VerificationTokenService,
        hasher: PasswordHasher,
        mailer: Arc<dyn Mailer>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            mailer,
            base_url: base_url.into(),
        }
    }

    /// Login state machine: shape, lookup, password, verification state.
    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, AuthError> {
        let credentials = input.validate().map_err(AuthError::Validation)?;

        let Some(user) = self
            .users
            .find_user_by_email(&credentials.email)
            .await
            .map_err(storage)?
        else {
            warn!(email = %credentials.email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        // Password-less accounts (external identity only) fail the same way
        // as an unknown email or a wrong password.
        let Some(hash) = user.password_hash.as_deref() else {
            warn!(email = %user.email, "login against password-less account");
            return Err(AuthError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify(&credentials.password, hash)
            .map_err(|err| {
                error!(error = %err, "password verification failed");
                AuthError::Storage
            })?;
        if !matches {
            warn!(email = %user.email, "login password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_verified() {
            let token = self.tokens.issue(&user.email).await?;
            self.send_verification(&user.email, &token.token).await?;
            info!(email = %user.email, "login pending email verification");
            return Ok(LoginOutcome::VerificationPending { email: user.email });
        }

        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(LoginOutcome::Authenticated(user))
    }

    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterInput) -> Result<RegistrationPending, AuthError> {
        let registration = input.validate().map_err(AuthError::Validation)?;

        // The unique index backstops the window between this check and the
        // insert below.
        if self
            .users
            .find_user_by_email(&registration.email)
            .await
            .map_err(storage)?
            .is_some()
        {
            warn!(email = %registration.email, "registration email already in use");
            return Err(AuthError::EmailInUse);
        }

        let password_hash = self.hasher.hash(&registration.password).map_err(|err| {
            error!(error = %err, "password hashing failed");
            AuthError::Storage
        })?;

        let user = match self
            .users
            .create_user(NewUser {
                email: registration.email,
                name: registration.name,
                password_hash: Some(password_hash),
                email_verified_at: None,
                image: None,
            })
            .await
        {
            Ok(user) => user,
            Err(StoreError::Conflict) => {
                warn!("registration lost the unique-email race");
                return Err(AuthError::EmailInUse);
            }
            Err(err) => return Err(storage(err)),
        };

        let token = self.tokens.issue(&user.email).await?;
        self.send_verification(&user.email, &token.token).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(RegistrationPending { email: user.email })
    }

    /// Redeems a verification link token and stamps the user verified.
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        self.verify_email_at(token, OffsetDateTime::now_utc()).await
    }

    /// `verify_email` with an explicit clock.
    pub async fn verify_email_at(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<User, AuthError> {
        let email = self.tokens.consume_at(token, now).await?;
        let Some(user) = self.users.find_user_by_email(&email).await.map_err(storage)? else {
            warn!(email = %email, "consumed token for a missing user");
            return Err(AuthError::InvalidToken);
        };
        // `email_verified_at` is set once; a second path to verification
        // keeps the first timestamp.
        if user.is_verified() {
            return Ok(user);
        }
        let user = self
            .users
            .update_user(user.id, UserUpdate::verified_at(now))
            .await
            .map_err(storage)?;
        info!(user_id = %user.id, email = %user.email, "email verified");
        Ok(user)
    }

    /// Applies an account linkage reported by the external identity-provider
    /// client. Creates the user on first contact; the mailbox was proven
    /// during the provider handshake, so the account is stamped verified.
    #[instrument(skip(self, identity), fields(provider_id = %identity.id))]
    pub async fn on_external_identity_linked(
        &self,
        identity: ExternalIdentity,
    ) -> Result<User, AuthError> {
        let email = identity.email.trim().to_lowercase();
        let now = OffsetDateTime::now_utc();

        let user = match self.users.find_user_by_email(&email).await.map_err(storage)? {
            Some(user) => user,
            None => {
                match self
                    .users
                    .create_user(NewUser {
                        email: email.clone(),
                        name: identity.name,
                        password_hash: None,
                        email_verified_at: Some(now),
                        image: identity.image,
                    })
                    .await
                {
                    Ok(user) => {
                        info!(user_id = %user.id, email = %user.email, "external identity created user");
                        return Ok(user);
                    }
                    // Lost a concurrent first-link race; pick up that row.
                    Err(StoreError::Conflict) => self
                        .users
                        .find_user_by_email(&email)
                        .await
                        .map_err(storage)?
                        .ok_or_else(|| {
                            error!(email = %email, "conflicting user vanished during link");
                            AuthError::Storage
                        })?,
                    Err(err) => return Err(storage(err)),
                }
            }
        };

        if user.is_verified() {
            return Ok(user);
        }
        let user = self
            .users
            .update_user(user.id, UserUpdate::verified_at(now))
            .await
            .map_err(storage)?;
        info!(user_id = %user.id, email = %user.email, "external identity linked");
        Ok(user)
    }

    /// Best-effort re-check that the session's user still exists. `None`
    /// means the account is gone and the session should be treated as dead.
    pub async fn current_user(&self, claims: &SessionClaims) -> Result<Option<User>, AuthError> {
        self.users
            .find_user_by_email(&claims.email)
            .await
            .map_err(storage)
    }

    async fn send_verification(&self, email: &str, token: &str) -> Result<(), AuthError> {
        let url = mailer::verification_url(&self.base_url, token);
        self.mailer
            .send_verification(email, &url)
            .await
            .map_err(|err| {
                error!(error = %err, email = %email, "verification email delivery failed");
                AuthError::Delivery
            })
    }
}

fn storage(err: StoreError) -> AuthError {
    error!(error = %err, "user store error");
    AuthError::Storage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::{FailingMailer, LogMailer, RecordingMailer};
    use crate::store::{MemoryStore, VerificationTokenStore};
    use uuid::Uuid;

    fn test_hasher() -> PasswordHasher {
        PasswordHasher::with_cost(8192, 1, 1).expect("test params")
    }

    fn authenticator_with(mailer: Arc<dyn Mailer>) -> (Authenticator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let auth = Authenticator::new(
            store.clone(),
            VerificationTokenService::new(store.clone()),
            test_hasher(),
            mailer,
            "http://localhost:8080",
        );
        (auth, store)
    }

    fn authenticator() -> (Authenticator, Arc<MemoryStore>) {
        authenticator_with(Arc::new(LogMailer))
    }

    fn login_input(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.into(),
            password: password.into(),
        }
    }

    fn register_input(name: &str, email: &str, password: &str, confirm: &str) -> RegisterInput {
        RegisterInput {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    fn jane() -> RegisterInput {
        register_input("Jane Doe", "jane@example.com", "secret123", "secret123")
    }

    fn claims_for(email: &str) -> SessionClaims {
        SessionClaims {
            sub: Uuid::new_v4(),
            email: email.into(),
            name: "Whoever".into(),
            image: None,
            exp: 0,
            iat: 0,
            iss: "test".into(),
            aud: "test".into(),
        }
    }

    #[tokio::test]
    async fn register_verify_login_end_to_end() {
        let (auth, store) = authenticator();

        let pending = auth.register(jane()).await.unwrap();
        assert_eq!(
            pending,
            RegistrationPending {
                email: "jane@example.com".into()
            }
        );

        let user = store
            .find_user_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.password_hash.is_some());
        assert!(user.email_verified_at.is_none());

        let tok1 = store
            .find_token_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        let verified = auth.verify_email(&tok1.token).await.unwrap();
        assert!(verified.email_verified_at.is_some());

        let outcome = auth
            .login(login_input("jane@example.com", "secret123"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            LoginOutcome::Authenticated(user) if user.email == "jane@example.com"
        ));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_fail_identically() {
        let (auth, _) = authenticator();
        auth.register(jane()).await.unwrap();

        let unknown = auth
            .login(login_input("ghost@example.com", "whatever-password"))
            .await
            .unwrap_err();
        let wrong = auth
            .login(login_input("jane@example.com", "not-the-password"))
            .await
            .unwrap_err();

        assert_eq!(unknown, wrong);
        assert_eq!(unknown, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn passwordless_account_fails_like_wrong_password() {
        let (auth, _) = authenticator();
        auth.on_external_identity_linked(ExternalIdentity {
            id: "gh-1".into(),
            email: "jane@example.com".into(),
            name: "Jane Doe".into(),
            image: None,
        })
        .await
        .unwrap();

        let err = auth
            .login(login_input("jane@example.com", "any-password"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn unverified_login_reissues_exactly_one_token() {
        let recorder = Arc::new(RecordingMailer::default());
        let (auth, store) = authenticator_with(recorder.clone());

        auth.register(jane()).await.unwrap();
        let first = store
            .find_token_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();

        let outcome = auth
            .login(login_input("jane@example.com", "secret123"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            LoginOutcome::VerificationPending { ref email } if email == "jane@example.com"
        ));

        // Registration mailed one link, the pending login another.
        assert_eq!(recorder.sent.lock().unwrap().len(), 2);

        // The re-issue superseded the registration token.
        assert!(store.find_token_by_value(&first.token).await.unwrap().is_none());
        let live = store
            .find_token_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(live.token, first.token);
    }

    #[tokio::test]
    async fn wrong_password_is_reported_before_verification_state() {
        let (auth, store) = authenticator();
        auth.register(jane()).await.unwrap();
        let registered_token = store
            .find_token_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();

        let err = auth
            .login(login_input("jane@example.com", "not-the-password"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);

        // No re-issue happened on the failed attempt.
        let live = store
            .find_token_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.token, registered_token.token);
    }

    #[tokio::test]
    async fn duplicate_registration_is_email_in_use() {
        let (auth, _) = authenticator();
        auth.register(jane()).await.unwrap();

        let err = auth.register(jane()).await.unwrap_err();
        assert_eq!(err, AuthError::EmailInUse);

        // Same address in different casing collides too.
        let err = auth
            .register(register_input(
                "Jane Doe",
                " Jane@EXAMPLE.com ",
                "secret123",
                "secret123",
            ))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::EmailInUse);
    }

    #[tokio::test]
    async fn validation_failures_never_touch_the_store() {
        let (auth, store) = authenticator();

        let err = auth
            .register(register_input("Jane Doe", "not-an-email", "secret123", "secret123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(ref errors) if errors.fields() == vec!["email"]));
        assert!(store
            .find_user_by_email("not-an-email")
            .await
            .unwrap()
            .is_none());

        let err = auth
            .login(login_input("jane@example.com", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn verification_token_is_single_use() {
        let (auth, store) = authenticator();
        auth.register(jane()).await.unwrap();
        let token = store
            .find_token_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();

        auth.verify_email(&token.token).await.unwrap();
        let err = auth.verify_email(&token.token).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn external_link_creates_a_verified_account_idempotently() {
        let (auth, _) = authenticator();
        let identity = ExternalIdentity {
            id: "gh-1".into(),
            email: "Jane@Example.com".into(),
            name: "Jane Doe".into(),
            image: Some("https://example.com/jane.png".into()),
        };

        let user = auth
            .on_external_identity_linked(identity.clone())
            .await
            .unwrap();
        assert_eq!(user.email, "jane@example.com");
        assert!(user.is_verified());
        assert!(user.password_hash.is_none());

        let again = auth.on_external_identity_linked(identity).await.unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(again.email_verified_at, user.email_verified_at);
    }

    #[tokio::test]
    async fn external_link_stamps_an_existing_credential_account() {
        let (auth, _) = authenticator();
        auth.register(jane()).await.unwrap();

        let user = auth
            .on_external_identity_linked(ExternalIdentity {
                id: "gh-1".into(),
                email: "jane@example.com".into(),
                name: "Jane Doe".into(),
                image: None,
            })
            .await
            .unwrap();
        assert!(user.is_verified());
        assert!(user.password_hash.is_some());

        // Verified through the link, so a credential login now authenticates.
        let outcome = auth
            .login(login_input("jane@example.com", "secret123"))
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
    }

    #[tokio::test]
    async fn delivery_failure_surfaces_after_the_account_exists() {
        let (auth, store) = authenticator_with(Arc::new(FailingMailer));

        let err = auth.register(jane()).await.unwrap_err();
        assert_eq!(err, AuthError::Delivery);

        // The account and its token were created before delivery failed; a
        // later unverified login can retry the email.
        assert!(store
            .find_user_by_email("jane@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_token_by_email("jane@example.com")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn current_user_reflects_account_existence() {
        let (auth, _) = authenticator();
        auth.register(jane()).await.unwrap();

        let known = auth
            .current_user(&claims_for("jane@example.com"))
            .await
            .unwrap();
        assert!(known.is_some());

        let gone = auth
            .current_user(&claims_for("ghost@example.com"))
            .await
            .unwrap();
        assert!(gone.is_none());
    }
}
