//! Credential Validation
//!
//! Authenticates a login attempt. Every failure is the same
//! `InvalidCredentials` and costs one password verification, so neither the
//! response nor its timing reveals whether the account exists.

use crate::error::AuthError;
use crate::models::User;
use crate::password::PasswordHasher;
use crate::store::UserStore;

use std::sync::Arc;

/// How a login identifier is looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Email(String),
    Username(String),
}

impl Identifier {
    /// Classify a raw identifier; anything containing `@` is an email
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.contains('@') {
            Identifier::Email(normalize_email(trimmed))
        } else {
            Identifier::Username(trimmed.to_string())
        }
    }
}

/// Canonical form of an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks login credentials against the user store
pub struct CredentialValidator {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
}

impl CredentialValidator {
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// Authenticate by email or username
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let user = match Identifier::parse(identifier) {
            Identifier::Email(email) => self.store.find_by_email(&email).await?,
            Identifier::Username(username) => self.store.find_by_username(&username).await?,
        };

        let Some(user) = user else {
            self.hasher
                .verify_decoy_blocking(password.to_string())
                .await?;
            tracing::debug!("Login rejected: unknown identifier");
            return Err(AuthError::InvalidCredentials);
        };

        let password_ok = self
            .hasher
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?;

        if !password_ok {
            tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::debug!(user_id = %user.id, "Login rejected: account inactive");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }
}
