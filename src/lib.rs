//! Users API
//!
//! User management REST service providing:
//! - User registration with Argon2id password hashing
//! - Login by email or username with JWT bearer tokens
//! - Current-user resolution from a token
//! - User listing, update and soft deactivation
//! - Liveness and readiness probes
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `SECRET_KEY` - Secret key for signing JWTs (required, min 32 chars)
//! - `ALGORITHM` - HS256, HS384 or HS512 (default: HS256)
//! - `ACCESS_TOKEN_EXPIRE_MINUTES` - Token lifetime (default: 30)
//! - `DATABASE_URL` - PostgreSQL connection string (required unless `USER_STORE=memory`)
//!
//! See [`config::AppConfig`] for the complete list.
//!
//! # Usage
//!
//! ```rust,ignore
//! use users_api::{build_app, AppConfig, AuthService, MemoryUserStore};
//!
//! let config = AppConfig::from_env()?;
//! let auth = Arc::new(AuthService::new(Arc::new(MemoryUserStore::new()), config.auth.clone())?);
//! let app = build_app(auth, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod token;

// Re-export commonly used types
pub use config::{AppConfig, AuthConfig};
pub use credentials::CredentialValidator;
pub use error::AuthError;
pub use extractors::AuthUser;
pub use handlers::AppState;
pub use models::*;
pub use password::PasswordHasher;
pub use service::AuthService;
pub use store::{MemoryUserStore, PgUserStore, UserStore};
pub use token::TokenIssuer;

use axum::Router;
use std::sync::Arc;

/// Build the HTTP application around an initialized auth service
pub fn build_app(auth: Arc<AuthService>, config: AppConfig) -> Router {
    handlers::create_routes(AppState::new(auth, config))
}
