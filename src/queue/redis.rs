use crate::config::RedisConfig;
use crate::payments::types::Payment;
use crate::queue::{PaymentQueue, QueueError};
use crate::redis_pool::{init_redis_pool, RedisPool};
use async_trait::async_trait;
use bb8_redis::redis::AsyncCommands;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::warn;

/// Redis-list-backed payment queue: RPUSH on send, BLPOP long-poll on
/// receive. Elements are JSON-encoded payments. Closing stops the poll
/// loop; elements still in the list survive for the next consumer.
pub struct RedisQueue {
    pool: RedisPool,
    queue_key: String,
    closed: AtomicBool,
    poll_timeout: Duration,
}

impl RedisQueue {
    pub async fn connect(config: &RedisConfig) -> Result<Self, QueueError> {
        let pool = init_redis_pool(config).await.map_err(backend)?;
        Ok(Self {
            pool,
            queue_key: config.queue_key.clone(),
            closed: AtomicBool::new(false),
            poll_timeout: Duration::from_secs(5),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn backend(err: impl std::fmt::Display) -> QueueError {
    QueueError::Backend {
        message: err.to_string(),
    }
}

#[async_trait]
impl PaymentQueue for RedisQueue {
    async fn send(&self, payment: Payment) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        let payload = serde_json::to_string(&payment).map_err(backend)?;
        let mut conn = self.pool.get().await.map_err(backend)?;
        let _: () = conn
            .rpush(&self.queue_key, payload)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn recv(&self) -> Option<Payment> {
        loop {
            if self.is_closed() {
                return None;
            }

            let mut conn = match self.pool.get().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to get redis connection for queue poll");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let reply: Result<Option<(String, String)>, _> = conn
                .blpop(&self.queue_key, self.poll_timeout.as_secs_f64())
                .await;

            match reply {
                Ok(Some((_, payload))) => match serde_json::from_str(&payload) {
                    Ok(payment) => return Some(payment),
                    Err(e) => {
                        warn!(error = %e, "discarding undecodable queue payload");
                        continue;
                    }
                },
                // Poll timeout with nothing queued; go around.
                Ok(None) => continue,
                Err(e) => {
                    if !self.is_closed() {
                        warn!(error = %e, "redis queue poll failed");
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            }
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
