//! Token Issuing and Verification
//!
//! Stateless HMAC-signed access tokens. Signature failures and expiry are
//! reported as different errors: the signature is checked first, and only a
//! genuine token can be reported as expired.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::TokenClaims;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

/// Issues and verifies access tokens
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Create an issuer from the configured secret and algorithm
    pub fn new(config: &AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        // Expiry is checked by hand after the signature, with no leeway.
        let mut validation = Validation::new(config.jwt_algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            algorithm: config.jwt_algorithm,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Issue a token for `subject` valid for `expiry_minutes`
    ///
    /// A non-positive expiry produces a token that is already expired. An
    /// expiry beyond the representable time range is [`AuthError::Internal`].
    pub fn issue(&self, subject: Uuid, expiry_minutes: i64) -> Result<String, AuthError> {
        self.issue_at(subject, expiry_minutes, Utc::now())
    }

    fn issue_at(
        &self,
        subject: Uuid,
        expiry_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let exp = Duration::try_minutes(expiry_minutes)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(AuthError::Internal)?;

        let claims = TokenClaims {
            sub: subject,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify a token against the current time
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token against an explicit clock
    ///
    /// Fails with [`AuthError::InvalidToken`] on a bad signature, a wrong
    /// algorithm or a malformed token, and with [`AuthError::ExpiredToken`]
    /// once `now` has reached the expiry time.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, AuthError> {
        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = token_data.claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::ExpiredToken);
        }

        Ok(claims)
    }
}
