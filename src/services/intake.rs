//! Payment admission
//!
//! Validates the payment, claims its correlation id in the dedup store,
//! and enqueues it for background dispatch. Store-then-send is
//! best-effort: a crash between the two calls leaves a dedup marker with
//! no queued payment, a window bounded by the store's TTL.

use crate::payments::types::{Payment, PaymentValidationError};
use crate::queue::{PaymentQueue, QueueError};
use crate::store::{DedupStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("invalid payment: {0}")]
    InvalidPayment(#[from] PaymentValidationError),

    #[error("correlation id {correlation_id} already exists")]
    Duplicate { correlation_id: String },

    #[error("dedup store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("payment queue is full")]
    QueueFull,

    #[error("payment queue is closed")]
    QueueClosed,

    #[error("payment queue unavailable: {message}")]
    QueueUnavailable { message: String },
}

pub struct IntakeService {
    store: Arc<dyn DedupStore>,
    queue: Arc<dyn PaymentQueue>,
    instance_id: String,
}

impl IntakeService {
    pub fn new(
        store: Arc<dyn DedupStore>,
        queue: Arc<dyn PaymentQueue>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            instance_id: instance_id.into(),
        }
    }

    pub async fn submit(&self, payment: Payment) -> Result<(), IntakeError> {
        payment.validate()?;

        match self.store.add(&payment.correlation_id).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => {
                return Err(IntakeError::Duplicate {
                    correlation_id: payment.correlation_id,
                });
            }
            Err(StoreError::Unavailable { message }) => {
                warn!(
                    instance = %self.instance_id,
                    correlation_id = %payment.correlation_id,
                    error = %message,
                    "dedup store unavailable during intake"
                );
                return Err(IntakeError::StoreUnavailable { message });
            }
        }

        let correlation_id = payment.correlation_id.clone();
        self.queue.send(payment).await.map_err(|err| {
            warn!(
                instance = %self.instance_id,
                correlation_id = %correlation_id,
                error = %err,
                "failed to enqueue payment"
            );
            match err {
                QueueError::Full => IntakeError::QueueFull,
                QueueError::Closed => IntakeError::QueueClosed,
                QueueError::Backend { message } => IntakeError::QueueUnavailable { message },
            }
        })?;

        info!(
            instance = %self.instance_id,
            correlation_id = %correlation_id,
            "payment accepted for processing"
        );
        Ok(())
    }
}
