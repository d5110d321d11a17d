//! Core payment domain types
//!
//! Amounts are carried as scaled-integer cents end to end so that
//! concurrent summation stays exact; on the wire they remain plain JSON
//! numbers with two decimal places.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A monetary amount in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    /// Convert a JSON number into cents. Rejects non-finite and negative
    /// values; sub-cent precision is rounded to the nearest cent.
    pub fn try_from_f64(value: f64) -> Result<Self, PaymentValidationError> {
        if !value.is_finite() {
            return Err(PaymentValidationError::InvalidAmount);
        }

        let cents = (value * 100.0).round();
        if cents < 0.0 {
            return Err(PaymentValidationError::NonPositiveAmount);
        }
        if cents > i64::MAX as f64 {
            return Err(PaymentValidationError::InvalidAmount);
        }

        Ok(Amount(cents as i64))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, cents / 100, cents % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Amount::try_from_f64(value).map_err(de::Error::custom)
    }
}

/// Validation errors for incoming payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaymentValidationError {
    #[error("correlation id is required")]
    MissingCorrelationId,

    #[error("invalid amount format")]
    InvalidAmount,

    #[error("amount must be positive")]
    NonPositiveAmount,
}

/// A payment request. Frozen after intake; cloned through the queue and
/// forwarded to the external processors verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    pub amount: Amount,
}

impl Payment {
    pub fn new(correlation_id: String, amount: f64) -> Result<Self, PaymentValidationError> {
        let payment = Payment {
            correlation_id,
            amount: Amount::try_from_f64(amount)?,
        };
        payment.validate()?;
        Ok(payment)
    }

    pub fn validate(&self) -> Result<(), PaymentValidationError> {
        if self.correlation_id.is_empty() {
            return Err(PaymentValidationError::MissingCorrelationId);
        }

        if !self.amount.is_positive() {
            return Err(PaymentValidationError::NonPositiveAmount);
        }

        Ok(())
    }
}

/// Routing lane to one external processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorChannel {
    Default,
    Fallback,
}

impl ProcessorChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorChannel::Default => "default",
            ProcessorChannel::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ProcessorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only ledger record of one successfully forwarded payment.
#[derive(Debug, Clone, Copy)]
pub struct PaymentEvent {
    pub when: DateTime<Utc>,
    pub channel: ProcessorChannel,
    pub amount: Amount,
}

/// Aggregated counters for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_requests: u64,
    pub total_amount: Amount,
}

impl ChannelStats {
    pub fn record(&mut self, amount: Amount) {
        self.total_requests += 1;
        self.total_amount = self.total_amount.saturating_add(amount);
    }
}

/// Per-channel audit summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentsSummary {
    pub default: ChannelStats,
    pub fallback: ChannelStats,
}
