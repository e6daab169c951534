//! Key/value cache with per-entry expiry

use async_trait::async_trait;
use bson::spec::BinarySubtype;
use bson::{doc, Binary};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache entry has an invalid expiry")]
    InvalidTtl,
}

impl From<mongodb::error::Error> for CacheError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Cache contract: atomic get and set-with-expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Process-local cache
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expires_at)) if Instant::now() < *expires_at => {
                    return Ok(Some(value.clone()))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // expired: drop it so the map does not grow without bound
        let mut entries = self.entries.write().await;
        if let Some((_, expires_at)) = entries.get(key) {
            if Instant::now() >= *expires_at {
                entries.remove(key);
            }
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(CacheError::InvalidTtl)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Cache entry document for MongoDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntity {
    #[serde(rename = "_id")]
    pub key: String,
    pub value: Binary,
    pub expires_at: bson::DateTime,
}

/// Cache kept in a MongoDB collection with a TTL index.
///
/// The TTL monitor only runs periodically, so reads also filter on
/// `expires_at` and an entry is never served past its expiry.
pub struct MongoCacheStore {
    db: Arc<RwLock<Database>>,
    collection_name: String,
}

impl MongoCacheStore {
    pub fn new(db: Arc<RwLock<Database>>, collection_name: String) -> Self {
        Self {
            db,
            collection_name,
        }
    }

    async fn collection(&self) -> Collection<CacheEntity> {
        self.db.read().await.collection(&self.collection_name)
    }

    pub async fn ensure_indexes(&self) -> Result<(), CacheError> {
        let collection = self.collection().await;
        let index = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Duration::ZERO)
                    .name("cache_expiry".to_string())
                    .build(),
            )
            .build();
        collection.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MongoCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let collection = self.collection().await;
        let filter = doc! {
            "_id": key,
            "expires_at": { "$gt": bson::DateTime::now() }
        };
        let result = collection.find_one(filter).await?;
        Ok(result.map(|entry| entry.value.bytes))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| CacheError::InvalidTtl)?;
        let expires_at = chrono::Utc::now()
            .checked_add_signed(ttl)
            .ok_or(CacheError::InvalidTtl)?;

        let entry = CacheEntity {
            key: key.to_string(),
            value: Binary {
                subtype: BinarySubtype::Generic,
                bytes: value,
            },
            expires_at: bson::DateTime::from_chrono(expires_at),
        };

        let collection = self.collection().await;
        collection
            .replace_one(doc! { "_id": key }, entry)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let collection = self.collection().await;
        collection.delete_one(doc! { "_id": key }).await?;
        Ok(())
    }
}
