//! PostgreSQL user store

use super::UserStore;
use crate::error::AuthError;
use crate::models::{NewUser, User, UserChanges};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, username, password_hash, is_active, is_superuser, created_at, updated_at";

/// User store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the users table and its unique indexes
    pub async fn migrate(&self) -> Result<(), AuthError> {
        tracing::info!("Running user store migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email VARCHAR(255) NOT NULL,
                username VARCHAR(50) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ
            );
            "#,
        )
        .execute(&self.db)
        .await?;

        // These indexes are what actually guarantees uniqueness under
        // concurrent registration.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_lower ON users (LOWER(email));",
        )
        .execute(&self.db)
        .await?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users (username);")
            .execute(&self.db)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_created_at ON users (created_at);")
            .execute(&self.db)
            .await?;

        tracing::info!("User store migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        // Unique violations surface as AuthError::DuplicateUser
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users
                (id, email, username, password_hash, is_active, is_superuser, created_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(new_user.is_superuser)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                username = COALESCE($3, username),
                password_hash = COALESCE($4, password_hash),
                is_active = COALESCE($5, is_active),
                is_superuser = COALESCE($6, is_superuser),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.username)
        .bind(&changes.password_hash)
        .bind(changes.is_active)
        .bind(changes.is_superuser)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn update_active_flag(&self, id: Uuid, active: bool) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>, AuthError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at, id OFFSET $1 LIMIT $2",
            USER_COLUMNS
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    async fn ping(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
