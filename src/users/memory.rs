use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::{
    repo::{StoreError, UniqueField, UserStore},
    repo_types::{NewUser, ProfileUpdate, Role, User},
};

/// In-process user store. Uniqueness is checked under the write lock, so it
/// behaves like the unique indexes on the Postgres table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    fn find_where(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users.read().values().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.find_where(|u| u.email.as_deref() == Some(email)))
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.find_where(|u| u.google_id.as_deref() == Some(google_id)))
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write();
        for existing in users.values() {
            if new.email.is_some() && existing.email == new.email {
                return Err(StoreError::Conflict(UniqueField::Email));
            }
            if new.google_id.is_some() && existing.google_id == new.google_id {
                return Err(StoreError::Conflict(UniqueField::GoogleId));
            }
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            google_id: new.google_id,
            password_hash: new.password_hash,
            name: new.name,
            avatar: new.avatar,
            role: Role::default(),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn link_google_id(
        &self,
        id: Uuid,
        google_id: &str,
        avatar: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write();
        if !users.get(&id).is_some_and(|u| u.google_id.is_none()) {
            return Ok(None);
        }
        if users
            .values()
            .any(|u| u.google_id.as_deref() == Some(google_id))
        {
            return Err(StoreError::Conflict(UniqueField::GoogleId));
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        user.google_id = Some(google_id.to_string());
        if user.avatar.is_none() {
            user.avatar = avatar.map(str::to_string);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(avatar) = update.avatar {
            user.avatar = Some(avatar);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }
}
