//! Authentication Extractors
//!
//! Axum extractors for the authenticated user and for JSON request bodies.

use crate::error::AuthError;
use crate::handlers::AppState;
use crate::models::User;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};

/// `axum::Json` whose rejections render as [`AuthError::Validation`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AuthError))]
pub struct JsonBody<T>(pub T);

/// User resolved from the request's bearer token
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn into_inner(self) -> User {
        self.0
    }
}

impl std::ops::Deref for AuthUser {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::InvalidToken)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }

    Ok(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already resolved by the require_auth middleware
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(&parts.headers)?;
        let user = state.auth.current_user(token).await?;

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers_with("bearer  abc")).unwrap(), "abc");
    }

    #[test]
    fn test_bearer_token_rejections() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::InvalidToken)
        ));
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer   ", "abc.def.ghi"] {
            assert!(matches!(
                bearer_token(&headers_with(value)),
                Err(AuthError::InvalidToken)
            ));
        }
    }
}
