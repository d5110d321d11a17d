use crate::payments::types::{Amount, ChannelStats, PaymentsSummary, ProcessorChannel};
use crate::repository::{RepositoryError, StatsRepository};
use async_trait::async_trait;
use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;

/// Postgres-backed statistics repository over the table
/// `payments(id bigserial, channel text, amount numeric,
/// created_at timestamptz default now())`. The schema is provisioned
/// externally; no migrations run here.
pub struct PostgresStatsRepository {
    pool: PgPool,
}

impl PostgresStatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }
}

fn amount_to_decimal(amount: Amount) -> BigDecimal {
    BigDecimal::new(BigInt::from(amount.cents()), 2)
}

fn decimal_to_amount(value: &BigDecimal) -> Amount {
    let cents = (value * BigDecimal::from(100)).with_scale(0);
    Amount::from_cents(cents.to_i64().unwrap_or(0))
}

#[async_trait]
impl StatsRepository for PostgresStatsRepository {
    async fn record(
        &self,
        channel: ProcessorChannel,
        amount: Amount,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO payments (channel, amount) VALUES ($1, $2)")
            .bind(channel.as_str())
            .bind(amount_to_decimal(amount))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn summary_in_range(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<PaymentsSummary, RepositoryError> {
        let mut sql = String::from(
            "SELECT channel, COUNT(*) AS total_requests, SUM(amount) AS total_amount \
             FROM payments WHERE 1=1",
        );

        if from.is_some() {
            sql.push_str(" AND created_at >= $1");
        }
        if to.is_some() {
            let position = if from.is_some() { 2 } else { 1 };
            sql.push_str(&format!(" AND created_at <= ${}", position));
        }
        sql.push_str(" GROUP BY channel");

        let mut query = sqlx::query(&sql);
        if let Some(from) = from {
            query = query.bind(from);
        }
        if let Some(to) = to {
            query = query.bind(to);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut summary = PaymentsSummary::default();
        for row in rows {
            let channel: String = row.try_get("channel")?;
            let total_requests: i64 = row.try_get("total_requests")?;
            let total_amount: BigDecimal = row.try_get("total_amount")?;

            let stats = ChannelStats {
                total_requests: total_requests.max(0) as u64,
                total_amount: decimal_to_amount(&total_amount),
            };

            match channel.as_str() {
                "default" => summary.default = stats,
                "fallback" => summary.fallback = stats,
                _ => {}
            }
        }

        Ok(summary)
    }
}
