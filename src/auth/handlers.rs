use axum::{
    extract::{FromRef, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        service::LoginOutcome,
        session::{self, AuthSession, SessionKeys},
        validate::{LoginInput, RegisterInput},
    },
    error::AuthError,
    models::{ExternalIdentity, PublicUser, User},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/email-verification", get(verify_email))
        .route("/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

pub fn callback_routes() -> Router<AppState> {
    Router::new().route("/api/auth/callback/:provider", post(oauth_callback))
}

#[derive(Debug, Serialize)]
struct AuthenticatedResponse {
    status: &'static str,
    user: PublicUser,
}

#[derive(Debug, Serialize)]
struct PendingResponse {
    status: &'static str,
    email: String,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Signs a session for `user` and wraps it in a `Set-Cookie` header.
fn session_headers(state: &AppState, user: &User) -> Result<HeaderMap, AuthError> {
    let keys = SessionKeys::from_ref(state);
    let token = keys.sign(user).map_err(|err| {
        error!(error = %err, "session signing failed");
        AuthError::Storage
    })?;
    let cookie = session::session_cookie(&token, keys.ttl);
    let value = HeaderValue::from_str(&cookie).map_err(|err| {
        error!(error = %err, "session cookie not header-safe");
        AuthError::Storage
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> Result<impl IntoResponse, AuthError> {
    let pending = state.auth.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(PendingResponse {
            status: "registration_pending",
            email: pending.email,
            message: "Confirmation email sent!",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginInput>,
) -> Result<Response, AuthError> {
    match state.auth.login(payload).await? {
        LoginOutcome::Authenticated(user) => {
            let headers = session_headers(&state, &user)?;
            let body = Json(AuthenticatedResponse {
                status: "authenticated",
                user: PublicUser::from(user),
            });
            Ok((StatusCode::OK, headers, body).into_response())
        }
        LoginOutcome::VerificationPending { email } => Ok((
            StatusCode::OK,
            Json(PendingResponse {
                status: "verification_pending",
                email,
                message: "Confirmation email sent!",
            }),
        )
            .into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    token: String,
}

#[instrument(skip(state, query))]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.verify_email(&query.token).await?;
    Ok(Json(MessageResponse {
        message: "Email verified!",
    }))
}

#[instrument]
pub async fn logout() -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&session::clear_session_cookie()) {
        headers.insert(header::SET_COOKIE, value);
    }
    (headers, Json(MessageResponse { message: "Signed out" })).into_response()
}

#[instrument(skip(state, session))]
pub async fn me(State(state): State<AppState>, AuthSession(session): AuthSession) -> Response {
    match state.auth.current_user(&session).await {
        Ok(Some(user)) => Json(PublicUser::from(user)).into_response(),
        Ok(None) => {
            warn!(email = %session.email, "session user no longer exists");
            (StatusCode::UNAUTHORIZED, "User not found".to_string()).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[instrument(skip(state, payload))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(payload): Json<ExternalIdentity>,
) -> Result<Response, AuthError> {
    let user = state.auth.on_external_identity_linked(payload).await?;
    let headers = session_headers(&state, &user)?;
    let body = Json(AuthenticatedResponse {
        status: "authenticated",
        user: PublicUser::from(user),
    });
    Ok((StatusCode::OK, headers, body).into_response())
}
