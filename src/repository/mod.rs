//! Channel statistics repository port and backends
//!
//! An append-only ledger of successfully forwarded payments with derived
//! per-channel aggregates. Totals are monotonically non-decreasing; the
//! range query is inclusive on both ends, with an absent lower bound
//! meaning the beginning of time and an absent upper bound meaning now.

pub mod memory;
pub mod postgres;

use crate::payments::types::{Amount, PaymentsSummary, ProcessorChannel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::InMemoryStatsRepository;
pub use postgres::PostgresStatsRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Append an event for the channel, stamped with the current UTC time.
    async fn record(
        &self,
        channel: ProcessorChannel,
        amount: Amount,
    ) -> Result<(), RepositoryError>;

    /// Summary over events with `when` in `[from ?? -inf, to ?? now]`.
    async fn summary_in_range(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<PaymentsSummary, RepositoryError>;

    /// Summary over all recorded events.
    async fn summary(&self) -> Result<PaymentsSummary, RepositoryError> {
        self.summary_in_range(None, None).await
    }
}
