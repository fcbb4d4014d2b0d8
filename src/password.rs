//! Password Hashing
//!
//! Argon2id hashing with a fresh salt per call. Verification uses the
//! parameters embedded in the stored PHC string, so cost changes in the
//! configuration never lock out existing users.

use crate::config::AuthConfig;
use crate::error::AuthError;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version,
};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::Ordering;

/// One-way password hasher
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    max_length: usize,
    /// Hash of a random password, checked when no real hash exists
    decoy_hash: Arc<str>,
    #[cfg(test)]
    verifications: Arc<std::sync::atomic::AtomicUsize>,
}

impl PasswordHasher {
    /// Build a hasher from the configured Argon2 cost parameters
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| AuthError::Configuration(format!("Invalid Argon2 parameters: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let decoy: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let salt = SaltString::generate(&mut OsRng);
        let decoy_hash = argon2.hash_password(decoy.as_bytes(), &salt)?.to_string();

        Ok(Self {
            argon2,
            max_length: config.max_password_length,
            decoy_hash: Arc::from(decoy_hash),
            #[cfg(test)]
            verifications: Arc::default(),
        })
    }

    /// Maximum accepted plaintext length in bytes
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Hash a password
    ///
    /// Inputs longer than the configured maximum are rejected before any
    /// hashing work is done.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        if plaintext.len() > self.max_length {
            return Err(AuthError::Validation(format!(
                "Password must be at most {} bytes",
                self.max_length
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)?
            .to_string();

        Ok(hash)
    }

    /// Verify a password against a stored hash
    ///
    /// Returns `false` for a malformed hash or an over-long plaintext. Both
    /// still cost one full Argon2 verification.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let too_long = plaintext.len() > self.max_length;
        let candidate = truncate_to(plaintext, self.max_length);

        match PasswordHash::new(hash) {
            Ok(parsed_hash) => self.run_verify(candidate, &parsed_hash) && !too_long,
            Err(e) => {
                tracing::warn!("Stored password hash is malformed: {}", e);
                self.verify_decoy(candidate)
            }
        }
    }

    /// Burn the same work as a real verification; always `false`
    pub fn verify_decoy(&self, plaintext: &str) -> bool {
        let candidate = truncate_to(plaintext, self.max_length);
        if let Ok(decoy) = PasswordHash::new(&self.decoy_hash) {
            let _ = self.run_verify(candidate, &decoy);
        }
        false
    }

    fn run_verify(&self, candidate: &str, hash: &PasswordHash<'_>) -> bool {
        #[cfg(test)]
        self.verifications.fetch_add(1, Ordering::Relaxed);

        self.argon2
            .verify_password(candidate.as_bytes(), hash)
            .is_ok()
    }

    /// Number of Argon2 verifications run by this hasher and its clones
    #[cfg(test)]
    pub(crate) fn verification_count(&self) -> usize {
        self.verifications.load(Ordering::Relaxed)
    }

    /// [`hash`](Self::hash) on the blocking thread pool
    pub async fn hash_blocking(&self, plaintext: String) -> Result<String, AuthError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await?
    }

    /// [`verify`](Self::verify) on the blocking thread pool
    pub async fn verify_blocking(
        &self,
        plaintext: String,
        hash: String,
    ) -> Result<bool, AuthError> {
        let hasher = self.clone();
        Ok(tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &hash)).await?)
    }

    /// [`verify_decoy`](Self::verify_decoy) on the blocking thread pool
    pub async fn verify_decoy_blocking(&self, plaintext: String) -> Result<bool, AuthError> {
        let hasher = self.clone();
        Ok(tokio::task::spawn_blocking(move || hasher.verify_decoy(&plaintext)).await?)
    }
}

fn truncate_to(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::Algorithm as JwtAlgorithm;

    /// Cheap Argon2 parameters so tests stay fast
    pub(crate) fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-that-is-at-least-32-chars".to_string(),
            jwt_algorithm: JwtAlgorithm::HS256,
            access_token_expire_minutes: 30,
            argon2_memory_cost: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            min_password_length: 8,
            max_password_length: 128,
        }
    }

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(&test_config()).unwrap()
    }

    #[test]
    fn test_hash_and_verify_correct() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse battery", &hash));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse battery").unwrap();
        assert!(!hasher.verify("wrong horse battery", &hash));
    }

    #[test]
    fn test_different_salts() {
        let hasher = hasher();
        let hash1 = hasher.hash("same-password").unwrap();
        let hash2 = hasher.hash("same-password").unwrap();
        assert_ne!(hash1, hash2);
        assert!(hasher.verify("same-password", &hash1));
        assert!(hasher.verify("same-password", &hash2));
    }

    #[test]
    fn test_malformed_hash_is_false() {
        let hasher = hasher();
        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert!(!hasher.verify("anything", ""));
        assert!(!hasher.verify("anything", "$argon2id$v=19$broken"));
    }

    #[test]
    fn test_overlong_password_rejected() {
        let hasher = hasher();
        let long = "x".repeat(hasher.max_length() + 1);
        assert!(matches!(hasher.hash(&long), Err(AuthError::Validation(_))));

        let at_limit = "x".repeat(hasher.max_length());
        let hash = hasher.hash(&at_limit).unwrap();
        assert!(hasher.verify(&at_limit, &hash));
        assert!(!hasher.verify(&long, &hash));
    }

    #[test]
    fn test_every_rejection_runs_a_verification() {
        let hasher = hasher();
        let hash = hasher.hash("x".repeat(hasher.max_length()).as_str()).unwrap();
        let long = "x".repeat(hasher.max_length() * 2);

        let before = hasher.verification_count();
        assert!(!hasher.verify(&long, &hash));
        assert_eq!(hasher.verification_count(), before + 1);

        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert_eq!(hasher.verification_count(), before + 2);

        assert!(!hasher.verify_decoy(&long));
        assert_eq!(hasher.verification_count(), before + 3);
    }

    #[test]
    fn test_verify_with_other_cost_params() {
        let mut config = test_config();
        config.argon2_time_cost = 2;
        let stronger = PasswordHasher::new(&config).unwrap();
        let hash = stronger.hash("portable-password").unwrap();

        assert!(hasher().verify("portable-password", &hash));
    }

    #[test]
    fn test_decoy_never_matches() {
        let hasher = hasher();
        assert!(!hasher.verify_decoy("anything"));
        assert!(!hasher.verify_decoy(&"é".repeat(200)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_to("héllo", 2), "h");
        assert_eq!(truncate_to("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hasher = hasher();
        let hash = hasher.hash_blocking("async-password".to_string()).await.unwrap();
        assert!(hasher
            .verify_blocking("async-password".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!hasher
            .verify_blocking("other-password".to_string(), hash)
            .await
            .unwrap());
        assert!(!hasher
            .verify_decoy_blocking("async-password".to_string())
            .await
            .unwrap());
    }
}
