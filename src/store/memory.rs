//! In-memory user store

use super::UserStore;
use crate::error::AuthError;
use crate::models::{NewUser, User, UserChanges};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// User store kept in process memory
///
/// Uniqueness is checked and the record written under one write lock, so
/// concurrent inserts with the same email or username cannot both succeed.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn conflicts(
    users: &HashMap<Uuid, User>,
    skip: Option<Uuid>,
    email: Option<&str>,
    username: Option<&str>,
) -> bool {
    users.values().filter(|u| Some(u.id) != skip).any(|u| {
        email.is_some_and(|e| u.email.to_lowercase() == e.to_lowercase())
            || username.is_some_and(|n| u.username == n)
    })
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let mut users = self.users.write().await;

        if conflicts(
            &users,
            None,
            Some(&new_user.email),
            Some(&new_user.username),
        ) {
            return Err(AuthError::DuplicateUser);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            is_active: true,
            is_superuser: new_user.is_superuser,
            created_at: Utc::now(),
            updated_at: None,
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, AuthError> {
        let mut users = self.users.write().await;

        if !users.contains_key(&id) {
            return Ok(None);
        }

        if conflicts(
            &users,
            Some(id),
            changes.email.as_deref(),
            changes.username.as_deref(),
        ) {
            return Err(AuthError::DuplicateUser);
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        if let Some(is_superuser) = changes.is_superuser {
            user.is_superuser = is_superuser;
        }
        user.updated_at = Some(Utc::now());

        Ok(Some(user.clone()))
    }

    async fn update_active_flag(&self, id: Uuid, active: bool) -> Result<Option<User>, AuthError> {
        let mut users = self.users.write().await;

        Ok(users.get_mut(&id).map(|user| {
            user.is_active = active;
            user.updated_at = Some(Utc::now());
            user.clone()
        }))
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>, AuthError> {
        let users = self.users.read().await;

        let mut all: Vec<&User> = users.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            is_superuser: false,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryUserStore::new();
        let user = store.insert_user(new_user("a@x.com", "alice")).await.unwrap();

        assert!(user.is_active);
        assert_eq!(store.find_by_id(user.id).await.unwrap().unwrap().id, user.id);
        assert_eq!(
            store.find_by_email("A@X.COM").await.unwrap().unwrap().id,
            user.id
        );
        assert!(store.find_by_username("alice").await.unwrap().is_some());
        assert!(store.find_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username_rejected() {
        let store = MemoryUserStore::new();
        store.insert_user(new_user("a@x.com", "alice")).await.unwrap();

        assert!(matches!(
            store.insert_user(new_user("A@x.com", "bob")).await,
            Err(AuthError::DuplicateUser)
        ));
        assert!(matches!(
            store.insert_user(new_user("b@x.com", "alice")).await,
            Err(AuthError::DuplicateUser)
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_single_winner() {
        let store = Arc::new(MemoryUserStore::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_user(new_user("race@x.com", &format!("racer{}", i)))
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_conflict_and_unknown_id() {
        let store = MemoryUserStore::new();
        let alice = store.insert_user(new_user("a@x.com", "alice")).await.unwrap();
        store.insert_user(new_user("b@x.com", "bob")).await.unwrap();

        let taken = UserChanges {
            username: Some("bob".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_user(alice.id, taken).await,
            Err(AuthError::DuplicateUser)
        ));

        // Keeping one's own email is not a conflict
        let same = UserChanges {
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        let updated = store.update_user(alice.id, same).await.unwrap().unwrap();
        assert!(updated.updated_at.is_some());

        assert!(store
            .update_user(Uuid::new_v4(), UserChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_deactivate_and_list() {
        let store = MemoryUserStore::new();
        let alice = store.insert_user(new_user("a@x.com", "alice")).await.unwrap();
        store.insert_user(new_user("b@x.com", "bob")).await.unwrap();

        let deactivated = store.update_active_flag(alice.id, false).await.unwrap().unwrap();
        assert!(!deactivated.is_active);
        assert!(store
            .update_active_flag(Uuid::new_v4(), false)
            .await
            .unwrap()
            .is_none());

        assert_eq!(store.list_users(0, 100).await.unwrap().len(), 2);
        assert_eq!(store.list_users(1, 100).await.unwrap().len(), 1);
        assert_eq!(store.list_users(0, 1).await.unwrap().len(), 1);
    }
}
