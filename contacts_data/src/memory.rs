//! In-memory repositories for tests. They enforce the same uniqueness
//! rules as the MongoDB indexes.

use crate::entities::{ContactData, ContactEntity, UserEntity};
use crate::error::DataError;
use crate::repositories::{ContactRepository, UserRepository};
use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<UserEntity>>,
}

impl InMemoryUserRepository {
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

    async fn modify<F>(&self, email: &str, f: F) -> Result<bool, DataError>
    where
        F: FnOnce(&mut UserEntity) -> bool + Send,
    {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.email == email) {
            Some(user) => {
                let changed = f(user);
                if changed {
                    user.updated_at = Utc::now();
                }
                Ok(changed)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, DataError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, DataError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, DataError> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, DataError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn insert(&self, mut user: UserEntity) -> Result<UserEntity, DataError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == user.username) {
            return Err(DataError::UsernameTaken);
        }
        if users.iter().any(|u| u.email == user.email) {
            return Err(DataError::EmailTaken);
        }
        user.id = Some(ObjectId::new());
        users.push(user.clone());
        Ok(user)
    }

    async fn set_refresh_token(&self, email: &str, token: Option<&str>) -> Result<(), DataError> {
        let token = token.map(str::to_string);
        self.modify(email, move |user| {
            user.refresh_token = token;
            true
        })
        .await?;
        Ok(())
    }

    async fn mark_confirmed(&self, email: &str) -> Result<bool, DataError> {
        self.modify(email, |user| {
            let changed = !user.confirmed;
            user.confirmed = true;
            changed
        })
        .await
    }

    async fn set_avatar(&self, email: &str, avatar_url: &str) -> Result<(), DataError> {
        let avatar_url = avatar_url.to_string();
        self.modify(email, move |user| {
            user.avatar_url = Some(avatar_url);
            true
        })
        .await?;
        Ok(())
    }
}

/// A user store that never answers, for exercising store timeouts
#[derive(Default)]
pub struct StalledUserRepository;

impl StalledUserRepository {
    pub fn new() -> Self {
        Self
    }
}

async fn stall<T>() -> T {
    std::future::pending().await
}

#[async_trait]
impl UserRepository for StalledUserRepository {
    async fn find_by_username(&self, _username: &str) -> Result<Option<UserEntity>, DataError> {
        stall().await
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<UserEntity>, DataError> {
        stall().await
    }

    async fn username_exists(&self, _username: &str) -> Result<bool, DataError> {
        stall().await
    }

    async fn email_exists(&self, _email: &str) -> Result<bool, DataError> {
        stall().await
    }

    async fn insert(&self, _user: UserEntity) -> Result<UserEntity, DataError> {
        stall().await
    }

    async fn set_refresh_token(&self, _email: &str, _token: Option<&str>) -> Result<(), DataError> {
        stall().await
    }

    async fn mark_confirmed(&self, _email: &str) -> Result<bool, DataError> {
        stall().await
    }

    async fn set_avatar(&self, _email: &str, _avatar_url: &str) -> Result<(), DataError> {
        stall().await
    }
}

#[derive(Default)]
pub struct InMemoryContactRepository {
    contacts: RwLock<Vec<ContactEntity>>,
}

impl InMemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_unique(
    contacts: &[ContactEntity],
    data: &ContactData,
    skip_id: Option<ObjectId>,
) -> Result<(), DataError> {
    let others = contacts
        .iter()
        .filter(|c| skip_id.map_or(true, |id| c.id != Some(id)));
    for other in others {
        if other.email == data.email {
            return Err(DataError::ContactEmailTaken);
        }
        if other.phone_number == data.phone_number {
            return Err(DataError::ContactPhoneTaken);
        }
    }
    Ok(())
}

#[async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn find(
        &self,
        owner_id: &ObjectId,
        id: &ObjectId,
    ) -> Result<Option<ContactEntity>, DataError> {
        let contacts = self.contacts.read().await;
        Ok(contacts
            .iter()
            .find(|c| c.id == Some(*id) && c.owner_id == *owner_id)
            .cloned())
    }

    async fn list(
        &self,
        owner_id: &ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<ContactEntity>, DataError> {
        let contacts = self.contacts.read().await;
        Ok(contacts
            .iter()
            .filter(|c| c.owner_id == *owner_id)
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn insert(
        &self,
        owner_id: &ObjectId,
        data: ContactData,
    ) -> Result<ContactEntity, DataError> {
        let mut contacts = self.contacts.write().await;
        check_unique(&contacts, &data, None)?;
        let mut contact = ContactEntity::from_data(*owner_id, data);
        contact.id = Some(ObjectId::new());
        contacts.push(contact.clone());
        Ok(contact)
    }

    async fn update(
        &self,
        owner_id: &ObjectId,
        id: &ObjectId,
        data: ContactData,
    ) -> Result<Option<ContactEntity>, DataError> {
        let mut contacts = self.contacts.write().await;
        if !contacts
            .iter()
            .any(|c| c.id == Some(*id) && c.owner_id == *owner_id)
        {
            return Ok(None);
        }
        check_unique(&contacts, &data, Some(*id))?;

        let contact = contacts
            .iter_mut()
            .find(|c| c.id == Some(*id))
            .ok_or_else(|| DataError::InternalError("contact vanished".to_string()))?;
        contact.apply(data);
        Ok(Some(contact.clone()))
    }

    async fn delete(
        &self,
        owner_id: &ObjectId,
        id: &ObjectId,
    ) -> Result<Option<ContactEntity>, DataError> {
        let mut contacts = self.contacts.write().await;
        let position = contacts
            .iter()
            .position(|c| c.id == Some(*id) && c.owner_id == *owner_id);
        Ok(position.map(|index| contacts.remove(index)))
    }

    async fn search(
        &self,
        owner_id: &ObjectId,
        query: &str,
    ) -> Result<Vec<ContactEntity>, DataError> {
        let needle = query.to_lowercase();
        let contacts = self.contacts.read().await;
        Ok(contacts
            .iter()
            .filter(|c| c.owner_id == *owner_id)
            .filter(|c| {
                c.first_name.to_lowercase().contains(&needle)
                    || c.last_name.to_lowercase().contains(&needle)
                    || c.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn with_birthdays(&self, owner_id: &ObjectId) -> Result<Vec<ContactEntity>, DataError> {
        let contacts = self.contacts.read().await;
        Ok(contacts
            .iter()
            .filter(|c| c.owner_id == *owner_id && c.birthday.is_some())
            .cloned()
            .collect())
    }
}
