use crate::payments::types::{
    Amount, ChannelStats, PaymentEvent, PaymentsSummary, ProcessorChannel,
};
use crate::repository::{RepositoryError, StatsRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

struct Ledger {
    events: Vec<PaymentEvent>,
    default: ChannelStats,
    fallback: ChannelStats,
}

/// In-memory statistics repository: an append-only event log for range
/// queries plus running counters for the all-time summary.
pub struct InMemoryStatsRepository {
    ledger: RwLock<Ledger>,
}

impl InMemoryStatsRepository {
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(Ledger {
                events: Vec::with_capacity(1024),
                default: ChannelStats::default(),
                fallback: ChannelStats::default(),
            }),
        }
    }

    async fn record_at(
        &self,
        when: DateTime<Utc>,
        channel: ProcessorChannel,
        amount: Amount,
    ) -> Result<(), RepositoryError> {
        let mut ledger = self.ledger.write().await;
        match channel {
            ProcessorChannel::Default => ledger.default.record(amount),
            ProcessorChannel::Fallback => ledger.fallback.record(amount),
        }
        ledger.events.push(PaymentEvent {
            when,
            channel,
            amount,
        });
        Ok(())
    }
}

impl Default for InMemoryStatsRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatsRepository for InMemoryStatsRepository {
    async fn record(
        &self,
        channel: ProcessorChannel,
        amount: Amount,
    ) -> Result<(), RepositoryError> {
        self.record_at(Utc::now(), channel, amount).await
    }

    async fn summary_in_range(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<PaymentsSummary, RepositoryError> {
        let ledger = self.ledger.read().await;

        if from.is_none() && to.is_none() {
            return Ok(PaymentsSummary {
                default: ledger.default,
                fallback: ledger.fallback,
            });
        }

        let end = to.unwrap_or_else(Utc::now);
        let mut summary = PaymentsSummary::default();
        for event in &ledger.events {
            if from.is_some_and(|start| event.when < start) || event.when > end {
                continue;
            }
            match event.channel {
                ProcessorChannel::Default => summary.default.record(event.amount),
                ProcessorChannel::Fallback => summary.fallback.record(event.amount),
            }
        }

        Ok(summary)
    }
}
