//! Audit summary over the statistics repository

use crate::payments::types::PaymentsSummary;
use crate::repository::{RepositoryError, StatsRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct AuditService {
    repository: Arc<dyn StatsRepository>,
}

impl AuditService {
    pub fn new(repository: Arc<dyn StatsRepository>) -> Self {
        Self { repository }
    }

    /// Per-channel summary over `[from ?? -inf, to ?? now]`, both ends
    /// inclusive. Times are UTC.
    pub async fn summary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<PaymentsSummary, RepositoryError> {
        self.repository.summary_in_range(from, to).await
    }
}
