//! Read-through cache of user snapshots keyed by email.
//!
//! The cache is best effort: backend errors, timeouts and snapshots that
//! fail to decode are logged and treated as a miss. A miss never produces
//! a user by itself; only the loader can.

use crate::models::{AuthResult, User};
use contacts_data::CacheStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Snapshot lifetime used by the service
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(15 * 60);

pub struct SessionCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    timeout: Duration,
}

impl SessionCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            store,
            ttl,
            timeout,
        }
    }

    fn key(email: &str) -> String {
        format!("user:{}", email)
    }

    pub async fn lookup(&self, email: &str) -> Option<User> {
        let key = Self::key(email);
        let bytes = match tokio::time::timeout(self.timeout, self.store.get(&key)).await {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => {
                debug!("Session cache miss for {}", email);
                return None;
            }
            Ok(Err(e)) => {
                warn!("Session cache read failed, using store: {}", e);
                return None;
            }
            Err(_) => {
                warn!("Session cache read timed out, using store");
                return None;
            }
        };

        match serde_json::from_slice::<User>(&bytes) {
            Ok(user) => {
                debug!("Session cache hit for {}", email);
                Some(user)
            }
            Err(e) => {
                warn!("Discarding undecodable session snapshot for {}: {}", email, e);
                None
            }
        }
    }

    pub async fn store(&self, email: &str, user: &User) {
        self.store_with_ttl(email, user, self.ttl).await
    }

    pub async fn store_with_ttl(&self, email: &str, user: &User, ttl: Duration) {
        let bytes = match serde_json::to_vec(user) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not serialize session snapshot: {}", e);
                return;
            }
        };

        let key = Self::key(email);
        match tokio::time::timeout(self.timeout, self.store.set(&key, bytes, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Session cache write failed: {}", e),
            Err(_) => warn!("Session cache write timed out"),
        }
    }

    pub async fn invalidate(&self, email: &str) {
        let key = Self::key(email);
        match tokio::time::timeout(self.timeout, self.store.delete(&key)).await {
            Ok(Ok(())) => debug!("Session cache entry dropped for {}", email),
            Ok(Err(e)) => warn!("Session cache invalidation failed: {}", e),
            Err(_) => warn!("Session cache invalidation timed out"),
        }
    }

    /// Serve from the cache, or call `load` and populate the cache with
    /// whatever it finds. Hits are returned without consulting the store.
    pub async fn get_or_load<F, Fut>(&self, email: &str, load: F) -> AuthResult<Option<User>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AuthResult<Option<User>>>,
    {
        if let Some(user) = self.lookup(email).await {
            return Ok(Some(user));
        }

        let user = load().await?;
        if let Some(user) = &user {
            self.store(email, user).await;
        }
        Ok(user)
    }
}
