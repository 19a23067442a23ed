//! Route guard: a pure routing decision over path and session presence,
//! plus the middleware that applies it to every request.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::auth::session::{self, CurrentSession, SessionKeys};
use crate::state::AppState;

/// Route tables consulted on every request.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// Exact paths reachable with or without a session.
    pub public_routes: Vec<String>,
    /// Exact paths for signing in or registering. A signed-in caller is
    /// bounced to `post_login_target` instead.
    pub auth_routes: Vec<String>,
    /// Prefix for external-identity callbacks, always reachable.
    pub api_auth_prefix: String,
    /// Where sessionless callers of protected routes are sent.
    pub sign_in_route: String,
    /// Where already-signed-in callers of auth routes are sent.
    pub post_login_target: String,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            public_routes: vec!["/".into(), "/email-verification".into()],
            auth_routes: vec!["/login".into(), "/register".into()],
            api_auth_prefix: "/api/auth".into(),
            sign_in_route: "/login".into(),
            post_login_target: "/user/1".into(),
        }
    }
}

/// Outcome of a guard decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(String),
}

impl RoutePolicy {
    /// Pure decision: no store access, no clock. Precedence is fixed:
    /// external-identity callbacks, then auth routes, then public routes,
    /// then everything else is protected.
    pub fn decide(&self, path: &str, has_session: bool) -> Decision {
        if path.starts_with(&self.api_auth_prefix) {
            return Decision::Allow;
        }
        if self.auth_routes.iter().any(|r| r == path) {
            if has_session {
                return Decision::Redirect(self.post_login_target.clone());
            }
            return Decision::Allow;
        }
        if self.public_routes.iter().any(|r| r == path) {
            return Decision::Allow;
        }
        if has_session {
            Decision::Allow
        } else {
            Decision::Redirect(self.sign_in_route.clone())
        }
    }
}

/// Decodes the session credential once per request, attaches it for
/// downstream extractors, and applies the routing decision.
pub async fn guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let keys = SessionKeys::from_config(&state.config.session);
    let claims = session::token_from_headers(req.headers())
        .and_then(|token| keys.verify(&token).ok());
    let has_session = claims.is_some();
    req.extensions_mut().insert(CurrentSession(claims));

    match state.config.routes.decide(req.uri().path(), has_session) {
        Decision::Allow => next.run(req).await,
        Decision::Redirect(target) => {
            debug!(path = %req.uri().path(), target = %target, "guard redirect");
            Redirect::temporary(&target).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_prefix_is_always_reachable() {
        let policy = RoutePolicy::default();
        assert_eq!(policy.decide("/api/auth/callback", true), Decision::Allow);
        assert_eq!(policy.decide("/api/auth/callback", false), Decision::Allow);
        assert_eq!(
            policy.decide("/api/auth/callback/github", false),
            Decision::Allow
        );
    }

    #[test]
    fn signed_in_caller_is_bounced_off_auth_routes() {
        let policy = RoutePolicy::default();
        assert_eq!(
            policy.decide("/login", true),
            Decision::Redirect("/user/1".into())
        );
        assert_eq!(
            policy.decide("/register", true),
            Decision::Redirect("/user/1".into())
        );
    }

    #[test]
    fn sessionless_caller_may_sign_in() {
        let policy = RoutePolicy::default();
        assert_eq!(policy.decide("/login", false), Decision::Allow);
        assert_eq!(policy.decide("/register", false), Decision::Allow);
    }

    #[test]
    fn protected_routes_redirect_to_sign_in() {
        let policy = RoutePolicy::default();
        assert_eq!(
            policy.decide("/settings", false),
            Decision::Redirect("/login".into())
        );
        assert_eq!(policy.decide("/settings", true), Decision::Allow);
    }

    #[test]
    fn public_routes_never_redirect() {
        let policy = RoutePolicy::default();
        assert_eq!(policy.decide("/", false), Decision::Allow);
        assert_eq!(policy.decide("/", true), Decision::Allow);
        assert_eq!(policy.decide("/email-verification", false), Decision::Allow);
    }

    #[test]
    fn auth_route_match_is_exact_not_prefix() {
        let policy = RoutePolicy::default();
        // "/login/help" is not an auth route, so without a session it is
        // treated as protected.
        assert_eq!(
            policy.decide("/login/help", false),
            Decision::Redirect("/login".into())
        );
    }
}
