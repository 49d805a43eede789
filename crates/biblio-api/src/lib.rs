//! Biblio REST API: Axum router over the borrow lifecycle, catalog, and reports.

pub mod auth;
pub mod config;
pub mod error;
pub mod seed;
pub mod server;

pub use auth::{AuthUser, USER_HEADER};
pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{router, AppState};
