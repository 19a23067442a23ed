use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod password;
pub mod service;
pub mod session;
pub mod tokens;
pub mod validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
        .merge(handlers::callback_routes())
}
