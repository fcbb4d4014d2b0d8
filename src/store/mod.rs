//! User Store
//!
//! Persistence seam for user records. The store is the single source of
//! truth and enforces email/username uniqueness itself; any check done by
//! the service beforehand is only a fast path.

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use crate::error::AuthError;
use crate::models::{NewUser, User, UserChanges};

use async_trait::async_trait;
use uuid::Uuid;

/// User persistence operations
///
/// Emails passed in are already normalized to lowercase; implementations
/// still compare them case-insensitively.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Find a user by email, ignoring case
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Find a user by exact username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    /// Insert a new active user
    ///
    /// Fails with [`AuthError::DuplicateUser`] when the email or username is
    /// already taken.
    async fn insert_user(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Apply a partial update, returning `None` for an unknown ID
    async fn update_user(&self, id: Uuid, changes: UserChanges)
        -> Result<Option<User>, AuthError>;

    /// Set the active flag, returning `None` for an unknown ID
    async fn update_active_flag(&self, id: Uuid, active: bool) -> Result<Option<User>, AuthError>;

    /// List users ordered by creation time
    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>, AuthError>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<(), AuthError>;
}
