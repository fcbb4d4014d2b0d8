//! Authentication Service
//!
//! Public operations of the service: registration, login, resolving the
//! current user from a token, and user management.

use crate::config::AuthConfig;
use crate::credentials::{normalize_email, CredentialValidator};
use crate::error::AuthError;
use crate::models::*;
use crate::password::PasswordHasher;
use crate::store::UserStore;
use crate::token::TokenIssuer;

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Default and maximum page size for user listing
pub const MAX_PAGE_SIZE: i64 = 100;

const USERNAME_MIN_LENGTH: usize = 3;
const USERNAME_MAX_LENGTH: usize = 50;

/// Authentication service
pub struct AuthService {
    store: Arc<dyn UserStore>,
    config: AuthConfig,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    credentials: CredentialValidator,
}

impl AuthService {
    /// Create a new authentication service
    ///
    /// Fails with [`AuthError::Configuration`] on invalid settings.
    pub fn new(store: Arc<dyn UserStore>, config: AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;

        let hasher = PasswordHasher::new(&config)?;
        let tokens = TokenIssuer::new(&config);
        let credentials = CredentialValidator::new(store.clone(), hasher.clone());

        Ok(Self {
            store,
            config,
            hasher,
            tokens,
            credentials,
        })
    }

    /// Get reference to config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Get reference to the token issuer
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    // ============================================
    // Input Rules
    // ============================================

    /// Validate password length bounds
    pub fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        if password.len() > self.config.max_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at most {} bytes",
                self.config.max_password_length
            )));
        }

        Ok(())
    }

    /// Validate username length and characters; `@` is reserved for emails
    ///
    /// Expects the already trimmed value.
    pub fn validate_username(username: &str) -> Result<(), AuthError> {
        let length = username.chars().count();
        if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&length) {
            return Err(AuthError::Validation(format!(
                "Username must be {}-{} characters",
                USERNAME_MIN_LENGTH, USERNAME_MAX_LENGTH
            )));
        }

        let valid = username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

        if !valid {
            return Err(AuthError::Validation(
                "Username may only contain letters, digits, '_', '-' and '.'".to_string(),
            ));
        }

        Ok(())
    }

    // ============================================
    // Registration
    // ============================================

    /// Register a new user
    pub async fn register(&self, req: RegisterRequest) -> Result<User, AuthError> {
        req.validate()?;
        let username = req.username.trim().to_string();
        Self::validate_username(&username)?;
        self.validate_password(&req.password)?;

        let email = normalize_email(&req.email);

        // Fast path only; the store's unique constraints decide races
        if self.store.find_by_email(&email).await?.is_some()
            || self.store.find_by_username(&username).await?.is_some()
        {
            return Err(AuthError::DuplicateUser);
        }

        let password_hash = self.hasher.hash_blocking(req.password).await?;

        let user = self
            .store
            .insert_user(NewUser {
                email,
                username,
                password_hash,
                is_superuser: false,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Create the configured superuser unless the email or username exists
    pub async fn ensure_superuser(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<bool, AuthError> {
        let email = normalize_email(email);
        let username = username.trim().to_string();

        if self.store.find_by_email(&email).await?.is_some()
            || self.store.find_by_username(&username).await?.is_some()
        {
            tracing::info!("Initial superuser '{}' already exists, skipping seed", username);
            return Ok(false);
        }

        Self::validate_username(&username)?;
        self.validate_password(password)?;
        let password_hash = self.hasher.hash_blocking(password.to_string()).await?;

        let user = self
            .store
            .insert_user(NewUser {
                email,
                username,
                password_hash,
                is_superuser: true,
            })
            .await?;

        tracing::info!(user_id = %user.id, "Created initial superuser");
        Ok(true)
    }

    // ============================================
    // Login / Current User
    // ============================================

    /// Authenticate and issue an access token
    pub async fn login(&self, req: LoginRequest) -> Result<TokenResponse, AuthError> {
        let user = self
            .credentials
            .authenticate(&req.identifier, &req.password)
            .await?;

        let minutes = self.config.access_token_expire_minutes;
        let access_token = self.tokens.issue(user.id, minutes)?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(TokenResponse::bearer(access_token, minutes * 60))
    }

    /// Resolve the user a token was issued to
    ///
    /// A valid token whose user is gone or deactivated is
    /// [`AuthError::UserNotFound`].
    pub async fn current_user(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.tokens.verify(token)?;

        match self.store.find_by_id(claims.sub).await? {
            Some(user) if user.is_active => Ok(user),
            Some(_) | None => {
                tracing::debug!(user_id = %claims.sub, "Token subject missing or inactive");
                Err(AuthError::UserNotFound)
            }
        }
    }

    // ============================================
    // User Management
    // ============================================

    /// List users with offset pagination
    pub async fn list_users(&self, params: ListParams) -> Result<Vec<User>, AuthError> {
        let skip = params.skip.unwrap_or(0).max(0);
        let limit = params.limit.unwrap_or(MAX_PAGE_SIZE).clamp(0, MAX_PAGE_SIZE);
        self.store.list_users(skip, limit).await
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Update a user on behalf of `actor`
    pub async fn update_user(
        &self,
        actor: &User,
        user_id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<User, AuthError> {
        req.validate()?;

        let target = self.get_user(user_id).await?;
        if !target.can_be_modified_by(actor) {
            return Err(AuthError::Forbidden);
        }

        if (req.is_active.is_some() || req.is_superuser.is_some()) && !actor.is_superuser {
            return Err(AuthError::Forbidden);
        }

        let username = match req.username {
            Some(username) => {
                let username = username.trim().to_string();
                Self::validate_username(&username)?;
                Some(username)
            }
            None => None,
        };

        let password_hash = match req.password {
            Some(password) => {
                self.validate_password(&password)?;
                Some(self.hasher.hash_blocking(password).await?)
            }
            None => None,
        };

        let changes = UserChanges {
            email: req.email.as_deref().map(normalize_email),
            username,
            password_hash,
            is_active: req.is_active,
            is_superuser: req.is_superuser,
        };

        if changes.is_empty() {
            return Ok(target);
        }

        let user = self
            .store
            .update_user(user_id, changes)
            .await?
            .ok_or(AuthError::NotFound)?;

        tracing::info!(user_id = %user.id, actor_id = %actor.id, "User updated");
        Ok(user)
    }

    /// Soft-delete a user by clearing the active flag
    pub async fn deactivate_user(&self, actor: &User, user_id: Uuid) -> Result<(), AuthError> {
        let target = self.get_user(user_id).await?;
        if !target.can_be_modified_by(actor) {
            return Err(AuthError::Forbidden);
        }

        self.store
            .update_active_flag(user_id, false)
            .await?
            .ok_or(AuthError::NotFound)?;

        tracing::info!(user_id = %user_id, actor_id = %actor.id, "User deactivated");
        Ok(())
    }

    /// Check that the user store is reachable
    pub async fn check_store(&self) -> Result<(), AuthError> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::tests::test_config;
    use crate::store::MemoryUserStore;

    fn service() -> (AuthService, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        let service = AuthService::new(store.clone(), test_config()).unwrap();
        (service, store)
    }

    fn register_req(email: &str, username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    fn login_req(identifier: &str, password: &str) -> LoginRequest {
        LoginRequest {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_new_rejects_short_secret() {
        let mut config = test_config();
        config.jwt_secret = "too-short".into();
        let store = Arc::new(MemoryUserStore::new());
        assert!(matches!(
            AuthService::new(store, config),
            Err(AuthError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_register_stores_hash_not_plaintext() {
        let (service, store) = service();
        let user = service
            .register(register_req("Alice@Example.com", "alice", "alice-password"))
            .await
            .unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert!(user.is_active);
        assert!(!user.is_superuser);
        assert_ne!(user.password_hash, "alice-password");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicates() {
        let (service, _) = service();
        service
            .register(register_req("a@x.com", "alice", "password-one"))
            .await
            .unwrap();

        let same_email = service
            .register(register_req("a@x.com", "bob", "password-two"))
            .await;
        assert!(matches!(same_email, Err(AuthError::DuplicateUser)));

        let case_variant = service
            .register(register_req("A@x.com", "bob", "password-two"))
            .await;
        assert!(matches!(case_variant, Err(AuthError::DuplicateUser)));

        let same_username = service
            .register(register_req("b@x.com", "alice", "password-two"))
            .await;
        assert!(matches!(same_username, Err(AuthError::DuplicateUser)));
    }

    #[tokio::test]
    async fn test_register_input_rules() {
        let (service, _) = service();

        let short = service
            .register(register_req("a@x.com", "alice", "short"))
            .await;
        assert!(matches!(short, Err(AuthError::Validation(_))));

        let long = service
            .register(register_req("a@x.com", "alice", &"p".repeat(129)))
            .await;
        assert!(matches!(long, Err(AuthError::Validation(_))));

        let bad_name = service
            .register(register_req("a@x.com", "al ice", "alice-password"))
            .await;
        assert!(matches!(bad_name, Err(AuthError::Validation(_))));

        let at_name = service
            .register(register_req("a@x.com", "al@ice", "alice-password"))
            .await;
        assert!(matches!(at_name, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_blank_or_padded_short_username() {
        let (service, store) = service();

        for username in ["   ", "  ab  ", " \t "] {
            let result = service
                .register(register_req("a@x.com", username, "alice-password"))
                .await;
            assert!(
                matches!(result, Err(AuthError::Validation(_))),
                "accepted username {:?}",
                username
            );
        }
        assert!(store.is_empty().await);

        let padded = service
            .register(register_req("a@x.com", "  alice  ", "alice-password"))
            .await
            .unwrap();
        assert_eq!(padded.username, "alice");
    }

    #[test]
    fn test_validate_username_bounds() {
        assert!(AuthService::validate_username("").is_err());
        assert!(AuthService::validate_username("ab").is_err());
        assert!(AuthService::validate_username("abc").is_ok());
        assert!(AuthService::validate_username(&"a".repeat(50)).is_ok());
        assert!(AuthService::validate_username(&"a".repeat(51)).is_err());
    }

    #[tokio::test]
    async fn test_update_rejects_blank_username() {
        let (service, _) = service();
        let alice = service
            .register(register_req("a@x.com", "alice", "alice-password"))
            .await
            .unwrap();

        let blank = UpdateUserRequest {
            username: Some("    ".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_user(&alice, alice.id, blank).await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(service.get_user(alice.id).await.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_login_and_current_user() {
        let (service, _) = service();
        let user = service
            .register(register_req("a@x.com", "alice", "alice-password"))
            .await
            .unwrap();

        let response = service
            .login(login_req("alice", "alice-password"))
            .await
            .unwrap();
        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.expires_in, 30 * 60);

        let current = service.current_user(&response.access_token).await.unwrap();
        assert_eq!(current.id, user.id);
    }

    #[tokio::test]
    async fn test_login_failures_indistinguishable() {
        let (service, _) = service();
        service
            .register(register_req("a@x.com", "alice", "alice-password"))
            .await
            .unwrap();

        let unknown = service
            .login(login_req("nonexistent", "anything"))
            .await
            .unwrap_err();
        let wrong = service
            .login(login_req("alice", "wrong-password"))
            .await
            .unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_current_user_after_deactivation() {
        let (service, store) = service();
        let user = service
            .register(register_req("a@x.com", "alice", "alice-password"))
            .await
            .unwrap();
        let token = service
            .login(login_req("a@x.com", "alice-password"))
            .await
            .unwrap()
            .access_token;

        store.update_active_flag(user.id, false).await.unwrap();

        let err = service.current_user(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_current_user_for_unknown_subject() {
        let (service, _) = service();
        let token = service.tokens().issue(Uuid::new_v4(), 30).unwrap();
        assert!(matches!(
            service.current_user(&token).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_current_user_token_failures() {
        let (service, _) = service();
        let user = service
            .register(register_req("a@x.com", "alice", "alice-password"))
            .await
            .unwrap();

        let expired = service.tokens().issue(user.id, 0).unwrap();
        assert!(matches!(
            service.current_user(&expired).await,
            Err(AuthError::ExpiredToken)
        ));
        assert!(matches!(
            service.current_user("not-a-token").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_update_permissions() {
        let (service, _) = service();
        let alice = service
            .register(register_req("a@x.com", "alice", "alice-password"))
            .await
            .unwrap();
        let bob = service
            .register(register_req("b@x.com", "bob", "bob-password"))
            .await
            .unwrap();

        let rename = UpdateUserRequest {
            username: Some("bobby".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_user(&alice, bob.id, rename.clone()).await,
            Err(AuthError::Forbidden)
        ));

        let renamed = service.update_user(&bob, bob.id, rename).await.unwrap();
        assert_eq!(renamed.username, "bobby");

        let promote = UpdateUserRequest {
            is_superuser: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            service.update_user(&bob, bob.id, promote).await,
            Err(AuthError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_password_change_takes_effect() {
        let (service, _) = service();
        let alice = service
            .register(register_req("a@x.com", "alice", "alice-password"))
            .await
            .unwrap();

        let change = UpdateUserRequest {
            password: Some("new-alice-password".into()),
            ..Default::default()
        };
        service.update_user(&alice, alice.id, change).await.unwrap();

        assert!(service
            .login(login_req("alice", "alice-password"))
            .await
            .is_err());
        assert!(service
            .login(login_req("alice", "new-alice-password"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_superuser_seed_and_deactivate() {
        let (service, _) = service();
        assert!(service
            .ensure_superuser("Admin@x.com", "admin", "admin-password")
            .await
            .unwrap());
        assert!(!service
            .ensure_superuser("admin@x.com", "admin", "admin-password")
            .await
            .unwrap());

        let admin = service
            .credentials
            .authenticate("admin", "admin-password")
            .await
            .unwrap();
        assert!(admin.is_superuser);

        let alice = service
            .register(register_req("a@x.com", "alice", "alice-password"))
            .await
            .unwrap();
        assert!(matches!(
            service.deactivate_user(&alice, admin.id).await,
            Err(AuthError::Forbidden)
        ));

        service.deactivate_user(&admin, alice.id).await.unwrap();
        let stored = service.get_user(alice.id).await.unwrap();
        assert!(!stored.is_active);
        assert!(matches!(
            service.login(login_req("alice", "alice-password")).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_list_pagination_is_capped() {
        let (service, _) = service();
        for i in 0..3 {
            service
                .register(register_req(
                    &format!("user{}@x.com", i),
                    &format!("user{}", i),
                    "user-password",
                ))
                .await
                .unwrap();
        }

        let all = service.list_users(ListParams::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let page = service
            .list_users(ListParams {
                skip: Some(1),
                limit: Some(1000),
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);

        assert!(matches!(
            service.get_user(Uuid::new_v4()).await,
            Err(AuthError::NotFound)
        ));
    }
}
