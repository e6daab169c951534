//! Repository implementations for user and contact data access

use crate::entities::{ContactData, ContactEntity, UserEntity};
use crate::error::{duplicate_key_message, DataError};
use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use futures_util::TryStreamExt;
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use std::sync::Arc;
use tokio::sync::RwLock;

const USERNAME_INDEX: &str = "username_unique";
const EMAIL_INDEX: &str = "email_unique";
const CONTACT_EMAIL_INDEX: &str = "contact_email_unique";
const CONTACT_PHONE_INDEX: &str = "contact_phone_unique";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by username
    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, DataError>;

    /// Find a user by email
    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, DataError>;

    /// Check if username exists
    async fn username_exists(&self, username: &str) -> Result<bool, DataError>;

    /// Check if email exists
    async fn email_exists(&self, email: &str) -> Result<bool, DataError>;

    /// Insert a new user. Unique index violations surface as
    /// `UsernameTaken` / `EmailTaken` and leave nothing behind.
    async fn insert(&self, user: UserEntity) -> Result<UserEntity, DataError>;

    /// Set or clear the live refresh token
    async fn set_refresh_token(&self, email: &str, token: Option<&str>) -> Result<(), DataError>;

    /// Mark the user as confirmed. Returns false if nothing changed.
    async fn mark_confirmed(&self, email: &str) -> Result<bool, DataError>;

    /// Store the avatar reference
    async fn set_avatar(&self, email: &str, avatar_url: &str) -> Result<(), DataError>;
}

/// Contact repository trait. Every operation is scoped by owner.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn find(&self, owner_id: &ObjectId, id: &ObjectId)
        -> Result<Option<ContactEntity>, DataError>;

    async fn list(
        &self,
        owner_id: &ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<ContactEntity>, DataError>;

    async fn insert(&self, owner_id: &ObjectId, data: ContactData)
        -> Result<ContactEntity, DataError>;

    /// Returns `None` when the contact does not exist for this owner
    async fn update(
        &self,
        owner_id: &ObjectId,
        id: &ObjectId,
        data: ContactData,
    ) -> Result<Option<ContactEntity>, DataError>;

    /// Returns the deleted contact, or `None` when it does not exist for this owner
    async fn delete(&self, owner_id: &ObjectId, id: &ObjectId)
        -> Result<Option<ContactEntity>, DataError>;

    /// Case-insensitive substring match over first name, last name and email
    async fn search(&self, owner_id: &ObjectId, query: &str)
        -> Result<Vec<ContactEntity>, DataError>;

    /// All contacts of the owner that have a birthday set
    async fn with_birthdays(&self, owner_id: &ObjectId) -> Result<Vec<ContactEntity>, DataError>;
}

/// MongoDB implementation of UserRepository
pub struct MongoUserRepository {
    db: Arc<RwLock<Database>>,
    collection_name: String,
}

impl MongoUserRepository {
    /// Create a new MongoDB user repository
    pub fn new(db: Arc<RwLock<Database>>, collection_name: String) -> Self {
        Self {
            db,
            collection_name,
        }
    }

    /// Get the users collection
    async fn collection(&self) -> Collection<UserEntity> {
        self.db.read().await.collection(&self.collection_name)
    }

    /// Create the unique indexes the service relies on to reject signup races
    pub async fn ensure_indexes(&self) -> Result<(), DataError> {
        let collection = self.collection().await;
        collection
            .create_indexes([
                unique_index(doc! { "username": 1 }, USERNAME_INDEX),
                unique_index(doc! { "email": 1 }, EMAIL_INDEX),
            ])
            .await?;
        Ok(())
    }

    async fn update_by_email(&self, email: &str, set: Document) -> Result<u64, DataError> {
        let collection = self.collection().await;
        let mut set = set;
        set.insert("updated_at", bson::DateTime::now());
        let result = collection
            .update_one(doc! { "email": email }, doc! { "$set": set })
            .await?;
        Ok(result.modified_count)
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, DataError> {
        let coll = self.collection().await;
        let result = coll.find_one(doc! { "username": username }).await?;
        Ok(result)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, DataError> {
        let coll = self.collection().await;
        let result = coll.find_one(doc! { "email": email }).await?;
        Ok(result)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, DataError> {
        let collection = self.collection().await;
        let count = collection
            .count_documents(doc! { "username": username })
            .await?;
        Ok(count > 0)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, DataError> {
        let collection = self.collection().await;
        let count = collection.count_documents(doc! { "email": email }).await?;
        Ok(count > 0)
    }

    async fn insert(&self, mut user: UserEntity) -> Result<UserEntity, DataError> {
        let collection = self.collection().await;
        let id = ObjectId::new();
        user.id = Some(id);

        collection.insert_one(&user).await.map_err(|e| {
            match duplicate_key_message(&e) {
                Some(message) if message.contains(USERNAME_INDEX) => DataError::UsernameTaken,
                Some(_) => DataError::EmailTaken,
                None => e.into(),
            }
        })?;

        Ok(user)
    }

    async fn set_refresh_token(&self, email: &str, token: Option<&str>) -> Result<(), DataError> {
        self.update_by_email(email, doc! { "refresh_token": token })
            .await?;
        Ok(())
    }

    async fn mark_confirmed(&self, email: &str) -> Result<bool, DataError> {
        let collection = self.collection().await;
        let result = collection
            .update_one(
                doc! { "email": email, "confirmed": false },
                doc! { "$set": { "confirmed": true, "updated_at": bson::DateTime::now() } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn set_avatar(&self, email: &str, avatar_url: &str) -> Result<(), DataError> {
        let modified = self
            .update_by_email(email, doc! { "avatar_url": avatar_url })
            .await?;
        tracing::debug!("Avatar updated for {} ({} document(s))", email, modified);
        Ok(())
    }
}

/// MongoDB implementation of ContactRepository
pub struct MongoContactRepository {
    db: Arc<RwLock<Database>>,
    collection_name: String,
}

impl MongoContactRepository {
    /// Create a new MongoDB contact repository
    pub fn new(db: Arc<RwLock<Database>>, collection_name: String) -> Self {
        Self {
            db,
            collection_name,
        }
    }

    /// Get the contacts collection
    async fn collection(&self) -> Collection<ContactEntity> {
        self.db.read().await.collection(&self.collection_name)
    }

    /// Contact email and phone are unique across the whole store
    pub async fn ensure_indexes(&self) -> Result<(), DataError> {
        let collection = self.collection().await;
        collection
            .create_indexes([
                unique_index(doc! { "email": 1 }, CONTACT_EMAIL_INDEX),
                unique_index(doc! { "phone_number": 1 }, CONTACT_PHONE_INDEX),
                IndexModel::builder().keys(doc! { "owner_id": 1 }).build(),
            ])
            .await?;
        Ok(())
    }

    async fn collect(&self, filter: Document) -> Result<Vec<ContactEntity>, DataError> {
        let collection = self.collection().await;
        let cursor = collection.find(filter).await?;
        Ok(cursor.try_collect().await?)
    }
}

fn contact_conflict(err: mongodb::error::Error) -> DataError {
    match duplicate_key_message(&err) {
        Some(message) if message.contains(CONTACT_PHONE_INDEX) => DataError::ContactPhoneTaken,
        Some(_) => DataError::ContactEmailTaken,
        None => err.into(),
    }
}

#[async_trait]
impl ContactRepository for MongoContactRepository {
    async fn find(
        &self,
        owner_id: &ObjectId,
        id: &ObjectId,
    ) -> Result<Option<ContactEntity>, DataError> {
        let collection = self.collection().await;
        let result = collection
            .find_one(doc! { "_id": id, "owner_id": owner_id })
            .await?;
        Ok(result)
    }

    async fn list(
        &self,
        owner_id: &ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<ContactEntity>, DataError> {
        let collection = self.collection().await;
        let cursor = collection
            .find(doc! { "owner_id": owner_id })
            .sort(doc! { "_id": 1 })
            .skip(skip)
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert(
        &self,
        owner_id: &ObjectId,
        data: ContactData,
    ) -> Result<ContactEntity, DataError> {
        let collection = self.collection().await;
        let mut contact = ContactEntity::from_data(*owner_id, data);
        contact.id = Some(ObjectId::new());

        collection
            .insert_one(&contact)
            .await
            .map_err(contact_conflict)?;

        Ok(contact)
    }

    async fn update(
        &self,
        owner_id: &ObjectId,
        id: &ObjectId,
        data: ContactData,
    ) -> Result<Option<ContactEntity>, DataError> {
        let collection = self.collection().await;
        let update = doc! {
            "$set": {
                "first_name": data.first_name,
                "last_name": data.last_name,
                "email": data.email,
                "phone_number": data.phone_number,
                "birthday": data.birthday.map(|b| b.to_string()),
                "additional_info": data.additional_info,
            }
        };

        let result = collection
            .find_one_and_update(doc! { "_id": id, "owner_id": owner_id }, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(contact_conflict)?;

        Ok(result)
    }

    async fn delete(
        &self,
        owner_id: &ObjectId,
        id: &ObjectId,
    ) -> Result<Option<ContactEntity>, DataError> {
        let collection = self.collection().await;
        let result = collection
            .find_one_and_delete(doc! { "_id": id, "owner_id": owner_id })
            .await?;
        Ok(result)
    }

    async fn search(
        &self,
        owner_id: &ObjectId,
        query: &str,
    ) -> Result<Vec<ContactEntity>, DataError> {
        let pattern = regex::escape(query);
        let filter = doc! {
            "owner_id": owner_id,
            "$or": [
                { "first_name": { "$regex": &pattern, "$options": "i" } },
                { "last_name": { "$regex": &pattern, "$options": "i" } },
                { "email": { "$regex": &pattern, "$options": "i" } },
            ]
        };
        self.collect(filter).await
    }

    async fn with_birthdays(&self, owner_id: &ObjectId) -> Result<Vec<ContactEntity>, DataError> {
        self.collect(doc! { "owner_id": owner_id, "birthday": { "$ne": null } })
            .await
    }
}

fn unique_index(keys: Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(name.to_string())
                .build(),
        )
        .build()
}
