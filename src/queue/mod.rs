//! Payment queue port and backends
//!
//! The queue decouples HTTP intake from background dispatch. `send` is
//! non-blocking and reports `Full` at capacity; `recv` is shared by
//! competing workers and terminates (returns `None`) once the queue is
//! closed and drained; `close` is idempotent.

pub mod memory;
pub mod redis;

use crate::payments::types::Payment;
use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryQueue;
pub use redis::RedisQueue;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("payment queue is full")]
    Full,

    #[error("payment queue is closed")]
    Closed,

    #[error("payment queue backend error: {message}")]
    Backend { message: String },
}

#[async_trait]
pub trait PaymentQueue: Send + Sync {
    /// Enqueue a payment without blocking.
    async fn send(&self, payment: Payment) -> Result<(), QueueError>;

    /// Receive the next payment. Each element is delivered to exactly one
    /// caller. Returns `None` once the queue has been closed and drained.
    async fn recv(&self) -> Option<Payment>;

    /// Close the queue. Pending elements drain; subsequent sends fail.
    async fn close(&self);
}
