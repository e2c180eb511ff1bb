use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::repo::{StoreError, UniqueField, UserStore};
use crate::users::repo_types::{NewUser, User};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<i64, User>,
}

impl Inner {
    /// Uniqueness check against every row except `skip_id`.
    fn check_unique(
        &self,
        username: &str,
        email: &str,
        skip_id: Option<i64>,
    ) -> Result<(), StoreError> {
        let others = self.users.values().filter(|u| Some(u.id) != skip_id);
        for u in others {
            if u.username == username {
                return Err(StoreError::Duplicate(UniqueField::Username));
            }
            if u.email == email {
                return Err(StoreError::Duplicate(UniqueField::Email));
            }
        }
        Ok(())
    }
}

/// In-process user store. Uniqueness is enforced under the write lock so
/// concurrent creates resolve exactly like a database unique constraint.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        inner.check_unique(&user.username, &user.email, None)?;
        inner.next_id += 1;
        let id = inner.next_id;
        let user = user.into_user(id, OffsetDateTime::now_utc());
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user.id) {
            return Err(StoreError::NotFound(user.id));
        }
        inner.check_unique(&user.username, &user.email, Some(user.id))?;
        inner.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.users.remove(&id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.inner.read().await.users.values().cloned().collect())
    }
}
