pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod mailer;
pub mod models;
pub mod state;
pub mod store;
