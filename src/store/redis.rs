use crate::config::RedisConfig;
use crate::redis_pool::{init_redis_pool, RedisPool};
use crate::store::{DedupStore, StoreError};
use async_trait::async_trait;
use bb8_redis::redis::{cmd, AsyncCommands};
use std::time::Duration;

const DEDUP_KEY_PREFIX: &str = "dedup:";

/// Redis-backed dedup set with per-key TTL. Insertion uses the atomic
/// `SET NX EX` primitive so racing intakes on the same correlation id
/// admit exactly one.
pub struct RedisDedupStore {
    pool: RedisPool,
    ttl: Duration,
}

impl RedisDedupStore {
    pub async fn connect(config: &RedisConfig, ttl: Duration) -> Result<Self, StoreError> {
        let pool = init_redis_pool(config).await.map_err(unavailable)?;
        Ok(Self { pool, ttl })
    }

    fn key(id: &str) -> String {
        format!("{}{}", DEDUP_KEY_PREFIX, id)
    }
}

fn unavailable(err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable {
        message: err.to_string(),
    }
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn add(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let reply: Option<String> = cmd("SET")
            .arg(Self::key(id))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async(&mut *conn)
            .await
            .map_err(unavailable)?;

        match reply {
            Some(_) => Ok(()),
            None => Err(StoreError::AlreadyExists),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        let exists: bool = conn.exists(Self::key(id)).await.map_err(unavailable)?;
        Ok(exists)
    }
}
