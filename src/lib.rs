//! Password + bearer-token authentication: an axum service with register,
//! login, current-user and protected endpoints, and a client that keeps the
//! issued token and reconciles it on start-up.

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod state;
pub mod store;
