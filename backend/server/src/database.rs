//! # Review store
//!
//! External document collection holding every review.
//!
//! Core purpose is to list, create and delete review documents. Nothing else is
//! kept server side, the page re-reads the whole collection after every mutation.
//!
//! ## Contract
//!
//! - `list_all`: every record in store enumeration order, no stable ordering promised
//! - `create`: exactly one write, store assigns the id, never retried on failure
//! - `delete_by_id`: deleting an id that is already gone still succeeds
//! - Any transport/backend failure is [`StoreError::Unavailable`]
//!
//! ## Backends
//!
//! - Firestore over REST, see [`crate::firestore`]
//! - Redis hash: 1 key per collection, record id to JSON document
//! - Memory, see [`crate::memory`]
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use records::{Document, NewReview, RecordId, ReviewRecord};
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    config::{Config, StoreBackend},
    firestore::FirestoreStore,
    memory::MemoryStore,
};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<ReviewRecord>, StoreError>;

    async fn create(&self, review: &NewReview) -> Result<RecordId, StoreError>;

    async fn delete_by_id(&self, id: &RecordId) -> Result<(), StoreError>;
}

pub async fn init_store(config: &Config) -> Result<Arc<dyn ReviewStore>, StoreError> {
    info!(
        "Using {} store for collection {}",
        config.store_backend.as_str(),
        config.collection
    );

    let store: Arc<dyn ReviewStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreStore::from_config(config)?),
        StoreBackend::Redis => {
            Arc::new(RedisStore::connect(&config.redis_url, &config.collection).await?)
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    Ok(store)
}

pub struct RedisStore {
    connection: ConnectionManager,
    key: String,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, key: &str) -> Result<Self, StoreError> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);

        let client = Client::open(redis_url)?;
        let connection = timeout(
            CONNECT_TIMEOUT,
            client.get_connection_manager_with_config(config),
        )
        .await
        .map_err(|_| StoreError::Unavailable(format!("timed out connecting to {redis_url}")))??;

        Ok(Self {
            connection,
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl ReviewStore for RedisStore {
    async fn list_all(&self) -> Result<Vec<ReviewRecord>, StoreError> {
        let mut connection = self.connection.clone();
        let entries: Vec<(String, String)> = connection.hgetall(&self.key).await?;

        let records = entries
            .into_iter()
            .filter_map(|(id, body)| match serde_json::from_str::<Document>(&body) {
                Ok(document) => Some(document.into_record(RecordId::new(id))),
                Err(e) => {
                    warn!("Skipping malformed review {id}: {e}");
                    None
                }
            })
            .collect();

        Ok(records)
    }

    async fn create(&self, review: &NewReview) -> Result<RecordId, StoreError> {
        let mut connection = self.connection.clone();
        let id = RecordId::generate();
        let body = serde_json::to_string(&Document::from(review))?;

        let created: bool = connection.hset_nx(&self.key, id.as_str(), body).await?;
        if !created {
            return Err(StoreError::Unavailable(format!("record id {id} already taken")));
        }

        debug!("Created review {id}");
        Ok(id)
    }

    async fn delete_by_id(&self, id: &RecordId) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let removed: usize = connection.hdel(&self.key, id.as_str()).await?;

        debug!("Deleted review {id} (removed {removed})");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_message() {
        let err = StoreError::Unavailable("connection refused".to_string());

        assert_eq!(err.to_string(), "Store unavailable: connection refused");
    }

    #[test]
    fn test_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn ReviewStore) {}
    }

    #[tokio::test]
    async fn test_memory_backend_from_config() {
        let config = Config::from_lookup(|_| None, |_| None).unwrap();
        let store = init_store(&config).await.unwrap();

        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redis_connect_failure() {
        let err = RedisStore::connect("redis://127.0.0.1:1", "reviews")
            .await
            .err()
            .unwrap();

        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_redis_bad_url() {
        assert!(RedisStore::connect("not a url", "reviews").await.is_err());
    }
}
