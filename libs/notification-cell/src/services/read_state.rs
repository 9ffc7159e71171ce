use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{NotificationError, NotificationKey};

/// Persisted set of acknowledged keys, partitioned by scope (one per viewer).
/// Concurrent writers are not coordinated; the last write wins.
#[async_trait]
pub trait ReadStateBackend: Send + Sync {
    async fn contains(&self, scope: &str, key: &str) -> Result<bool, NotificationError>;

    async fn insert(&self, scope: &str, keys: &[String]) -> Result<(), NotificationError>;

    async fn members(&self, scope: &str) -> Result<HashSet<String>, NotificationError>;

    async fn clear(&self, scope: &str) -> Result<(), NotificationError>;
}

// ==============================================================================
// IN-MEMORY BACKEND
// ==============================================================================

#[derive(Default)]
pub struct InMemoryReadState {
    scopes: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemoryReadState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadStateBackend for InMemoryReadState {
    async fn contains(&self, scope: &str, key: &str) -> Result<bool, NotificationError> {
        let scopes = self.scopes.read().await;
        Ok(scopes.get(scope).is_some_and(|keys| keys.contains(key)))
    }

    async fn insert(&self, scope: &str, keys: &[String]) -> Result<(), NotificationError> {
        let mut scopes = self.scopes.write().await;
        scopes
            .entry(scope.to_string())
            .or_default()
            .extend(keys.iter().cloned());
        Ok(())
    }

    async fn members(&self, scope: &str) -> Result<HashSet<String>, NotificationError> {
        let scopes = self.scopes.read().await;
        Ok(scopes.get(scope).cloned().unwrap_or_default())
    }

    async fn clear(&self, scope: &str) -> Result<(), NotificationError> {
        self.scopes.write().await.remove(scope);
        Ok(())
    }
}

// ==============================================================================
// REDIS BACKEND
// ==============================================================================

const KEY_PREFIX: &str = "notification_read";

/// One Redis set per scope, so read-state survives restarts and is shared
/// by every API instance.
pub struct RedisReadState {
    pool: Pool,
    prefix: String,
}

impl RedisReadState {
    pub async fn new(redis_url: &str) -> Result<Self, NotificationError> {
        Self::with_prefix(redis_url, KEY_PREFIX).await
    }

    pub async fn with_prefix(redis_url: &str, prefix: &str) -> Result<Self, NotificationError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| NotificationError::ReadState(format!("Failed to create Redis pool: {}", e)))?;

        let backend = Self {
            pool,
            prefix: prefix.to_string(),
        };

        let mut conn = backend.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis read-state initialized with prefix '{}'", prefix);

        Ok(backend)
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, NotificationError> {
        self.pool
            .get()
            .await
            .map_err(|e| NotificationError::ReadState(format!("Failed to get Redis connection: {}", e)))
    }

    fn set_key(&self, scope: &str) -> String {
        format!("{}:{}", self.prefix, scope)
    }
}

#[async_trait]
impl ReadStateBackend for RedisReadState {
    async fn contains(&self, scope: &str, key: &str) -> Result<bool, NotificationError> {
        let mut conn = self.connection().await?;
        Ok(conn.sismember(self.set_key(scope), key).await?)
    }

    async fn insert(&self, scope: &str, keys: &[String]) -> Result<(), NotificationError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let added: usize = conn.sadd(self.set_key(scope), keys).await?;
        debug!("Marked {} of {} keys read for {}", added, keys.len(), scope);
        Ok(())
    }

    async fn members(&self, scope: &str) -> Result<HashSet<String>, NotificationError> {
        let mut conn = self.connection().await?;
        Ok(conn.smembers(self.set_key(scope)).await?)
    }

    async fn clear(&self, scope: &str) -> Result<(), NotificationError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(self.set_key(scope)).await?;
        Ok(())
    }
}

// ==============================================================================
// TRACKER
// ==============================================================================

/// Read-state of one viewer: typed keys over a shared backend.
#[derive(Clone)]
pub struct ReadStateTracker {
    backend: Arc<dyn ReadStateBackend>,
    scope: String,
}

impl ReadStateTracker {
    pub fn new(backend: Arc<dyn ReadStateBackend>, scope: impl Into<String>) -> Self {
        Self {
            backend,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub async fn has(&self, key: &NotificationKey) -> Result<bool, NotificationError> {
        self.backend.contains(&self.scope, &key.to_string()).await
    }

    pub async fn add(&self, key: NotificationKey) -> Result<(), NotificationError> {
        self.backend.insert(&self.scope, &[key.to_string()]).await
    }

    pub async fn add_all<I>(&self, keys: I) -> Result<(), NotificationError>
    where
        I: IntoIterator<Item = NotificationKey>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.to_string()).collect();
        self.backend.insert(&self.scope, &keys).await
    }

    /// Forgets every acknowledgement (logout).
    pub async fn clear(&self) -> Result<(), NotificationError> {
        self.backend.clear(&self.scope).await
    }

    /// Acknowledged keys; entries that are not valid keys are skipped.
    pub async fn snapshot(&self) -> Result<HashSet<NotificationKey>, NotificationError> {
        let raw = self.backend.members(&self.scope).await?;
        Ok(raw.iter().filter_map(|k| k.parse().ok()).collect())
    }
}
