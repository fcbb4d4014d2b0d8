//! Service Configuration
//!
//! All configuration values are loaded once from environment variables at
//! startup and treated as immutable afterwards. No hardcoded secrets.

use crate::error::AuthError;
use argon2::Params;
use jsonwebtoken::Algorithm;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Upper bound for `PASSWORD_MAX_LENGTH`
const PASSWORD_LENGTH_CEILING: usize = 1024;

/// Upper bound for `ACCESS_TOKEN_EXPIRE_MINUTES` (one year)
pub const MAX_TOKEN_EXPIRE_MINUTES: i64 = 525_600;

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret key for signing tokens (from SECRET_KEY or JWT_SECRET env var)
    pub jwt_secret: String,

    /// Symmetric signing algorithm (from ALGORITHM env var)
    pub jwt_algorithm: Algorithm,

    /// Access token lifetime in minutes (from ACCESS_TOKEN_EXPIRE_MINUTES env var)
    pub access_token_expire_minutes: i64,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Minimum password length (from MIN_PASSWORD_LENGTH env var)
    pub min_password_length: usize,

    /// Maximum password length in bytes (from PASSWORD_MAX_LENGTH env var)
    pub max_password_length: usize,
}

// The secret must never end up in logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("argon2_memory_cost", &self.argon2_memory_cost)
            .field("argon2_time_cost", &self.argon2_time_cost)
            .field("argon2_parallelism", &self.argon2_parallelism)
            .field("min_password_length", &self.min_password_length)
            .field("max_password_length", &self.max_password_length)
            .finish()
    }
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("SECRET_KEY")
            .or_else(|| lookup("JWT_SECRET"))
            .ok_or_else(|| AuthError::Configuration("SECRET_KEY must be set".to_string()))?;

        let jwt_algorithm = match lookup("ALGORITHM") {
            Some(value) => parse_algorithm(&value)?,
            None => Algorithm::HS256,
        };

        let config = Self {
            jwt_secret,
            jwt_algorithm,
            access_token_expire_minutes: parse_or(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", 30)?,
            argon2_memory_cost: parse_or(&lookup, "ARGON2_MEMORY_COST", Params::DEFAULT_M_COST)?,
            argon2_time_cost: parse_or(&lookup, "ARGON2_TIME_COST", Params::DEFAULT_T_COST)?,
            argon2_parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", Params::DEFAULT_P_COST)?,
            min_password_length: parse_or(&lookup, "MIN_PASSWORD_LENGTH", 8)?,
            max_password_length: parse_or(&lookup, "PASSWORD_MAX_LENGTH", 128)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.chars().count() < 32 {
            return Err(AuthError::Configuration(
                "SECRET_KEY must be at least 32 characters".to_string(),
            ));
        }

        if !matches!(
            self.jwt_algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::Configuration(
                "ALGORITHM must be one of HS256, HS384, HS512".to_string(),
            ));
        }

        if !(1..=MAX_TOKEN_EXPIRE_MINUTES).contains(&self.access_token_expire_minutes) {
            return Err(AuthError::Configuration(format!(
                "ACCESS_TOKEN_EXPIRE_MINUTES must be between 1 and {}",
                MAX_TOKEN_EXPIRE_MINUTES
            )));
        }

        if self.min_password_length == 0 || self.min_password_length > self.max_password_length {
            return Err(AuthError::Configuration(
                "MIN_PASSWORD_LENGTH must be between 1 and PASSWORD_MAX_LENGTH".to_string(),
            ));
        }

        if self.max_password_length > PASSWORD_LENGTH_CEILING {
            return Err(AuthError::Configuration(format!(
                "PASSWORD_MAX_LENGTH must not exceed {}",
                PASSWORD_LENGTH_CEILING
            )));
        }

        Params::new(
            self.argon2_memory_cost,
            self.argon2_time_cost,
            self.argon2_parallelism,
            None,
        )
        .map_err(|e| AuthError::Configuration(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(())
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
    Testing,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    fn default_log_level(&self) -> &'static str {
        match self {
            Environment::Development | Environment::Testing => "debug",
            Environment::Staging | Environment::Production => "info",
        }
    }
}

impl FromStr for Environment {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            "testing" | "test" => Ok(Environment::Testing),
            other => Err(AuthError::Configuration(format!(
                "Unknown ENVIRONMENT '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backing store for user records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(AuthError::Configuration(format!(
                "Unknown USER_STORE '{}'",
                other
            ))),
        }
    }
}

/// Superuser seeded at startup when it does not exist yet
#[derive(Clone)]
pub struct InitialSuperuser {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for InitialSuperuser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitialSuperuser")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub version: String,
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub log_level: String,
    pub allowed_origins: Vec<String>,
    pub enable_security_headers: bool,
    pub enable_health_checks: bool,
    pub initial_superuser: Option<InitialSuperuser>,
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment: Environment = match lookup("ENVIRONMENT") {
            Some(value) => value.parse()?,
            None => Environment::Development,
        };

        let store: StoreKind = match lookup("USER_STORE") {
            Some(value) => value.parse()?,
            None => StoreKind::Postgres,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let initial_superuser = match (
            lookup("INITIAL_SUPERUSER_EMAIL"),
            lookup("INITIAL_SUPERUSER_USERNAME"),
            lookup("INITIAL_SUPERUSER_PASSWORD"),
        ) {
            (Some(email), Some(username), Some(password)) => Some(InitialSuperuser {
                email,
                username,
                password,
            }),
            (None, None, None) => None,
            _ => {
                return Err(AuthError::Configuration(
                    "INITIAL_SUPERUSER_EMAIL, INITIAL_SUPERUSER_USERNAME and \
                     INITIAL_SUPERUSER_PASSWORD must be set together"
                        .to_string(),
                ))
            }
        };

        let config = Self {
            app_name: lookup("APP_NAME").unwrap_or_else(|| "users-api".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "WEB_PORT", 8000)?,
            store,
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            log_level: lookup("LOG_LEVEL")
                .unwrap_or_else(|| environment.default_log_level().to_string()),
            allowed_origins,
            enable_security_headers: parse_bool_or(&lookup, "ENABLE_SECURITY_HEADERS", true)?,
            enable_health_checks: parse_bool_or(&lookup, "ENABLE_HEALTH_CHECKS", true)?,
            initial_superuser,
            auth: AuthConfig::from_lookup(&lookup)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.store == StoreKind::Postgres && self.database_url.is_none() {
            return Err(AuthError::Configuration(
                "DATABASE_URL must be set when USER_STORE is postgres".to_string(),
            ));
        }

        if self.db_max_connections == 0 {
            return Err(AuthError::Configuration(
                "DB_MAX_CONNECTIONS must be positive".to_string(),
            ));
        }

        if self.environment.is_production() {
            if self.allowed_origins.iter().any(|o| o == "*") {
                return Err(AuthError::Configuration(
                    "ALLOWED_ORIGINS must be restricted in production".to_string(),
                ));
            }

            if self.store == StoreKind::Memory {
                return Err(AuthError::Configuration(
                    "USER_STORE=memory is not allowed in production".to_string(),
                ));
            }
        }

        self.auth.validate()
    }
}

fn parse_algorithm(value: &str) -> Result<Algorithm, AuthError> {
    match value.trim().to_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(AuthError::Configuration(format!(
            "Unsupported ALGORITHM '{}', expected HS256, HS384 or HS512",
            other
        ))),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AuthError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AuthError::Configuration(format!("{} has an invalid value", key))),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(AuthError::Configuration(format!(
                "{} must be a boolean",
                key
            ))),
        },
        None => Ok(default),
    }
}
