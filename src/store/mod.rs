//! Dedup store port and backends
//!
//! A presence set over correlation ids ensuring at-most-one intake per
//! id. `add` is atomic: concurrent callers racing on the same id see
//! exactly one success.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryDedupStore;
pub use redis::RedisDedupStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("correlation id already exists")]
    AlreadyExists,

    #[error("dedup store unavailable: {message}")]
    Unavailable { message: String },
}

#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Record an id, rejecting duplicates.
    async fn add(&self, id: &str) -> Result<(), StoreError>;

    /// Whether an id has been recorded (and not yet expired).
    async fn exists(&self, id: &str) -> Result<bool, StoreError>;
}
