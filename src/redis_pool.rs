//! Shared Redis connection pooling for the redis-backed queue and dedup
//! store. The `bb8` and `redis` types are taken through `bb8-redis`'s
//! re-exports so the pool and command layers stay version-locked.

use crate::config::RedisConfig;
use bb8_redis::bb8::Pool;
use bb8_redis::redis::RedisError;
use bb8_redis::RedisConnectionManager;
use std::time::Duration;
use tracing::info;

pub type RedisPool = Pool<RedisConnectionManager>;

/// Build a Redis connection pool from configuration.
pub async fn init_redis_pool(config: &RedisConfig) -> Result<RedisPool, RedisError> {
    let manager = RedisConnectionManager::new(config.url.as_str())?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(5))
        .build(manager)
        .await?;

    info!(
        redis_url = %config.url,
        max_connections = config.max_connections,
        "redis connection pool initialized"
    );
    Ok(pool)
}
