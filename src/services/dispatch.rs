//! Payment routing policy
//!
//! Default-first with fallback: the default processor sits behind the
//! circuit breaker; the fallback is the safety valve and is tried
//! directly whenever the default path fails, including while the breaker
//! is open. Successful forwards are recorded in the statistics
//! repository; a recording failure never fails the dispatch.

use crate::payments::breaker::{BreakerError, CircuitBreaker};
use crate::payments::error::ProcessorError;
use crate::payments::processor::PaymentProcessor;
use crate::payments::types::{Payment, PaymentValidationError, ProcessorChannel};
use crate::repository::StatsRepository;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid payment: {0}")]
    InvalidPayment(#[from] PaymentValidationError),

    #[error("both default and fallback processors failed: {source}")]
    BothProcessorsFailed {
        #[source]
        source: ProcessorError,
    },
}

pub struct PaymentDispatcher {
    default_processor: Arc<dyn PaymentProcessor>,
    fallback_processor: Arc<dyn PaymentProcessor>,
    breaker: Arc<CircuitBreaker>,
    repository: Arc<dyn StatsRepository>,
}

impl PaymentDispatcher {
    pub fn new(
        default_processor: Arc<dyn PaymentProcessor>,
        fallback_processor: Arc<dyn PaymentProcessor>,
        breaker: Arc<CircuitBreaker>,
        repository: Arc<dyn StatsRepository>,
    ) -> Self {
        Self {
            default_processor,
            fallback_processor,
            breaker,
            repository,
        }
    }

    pub async fn dispatch(&self, payment: &Payment) -> Result<(), DispatchError> {
        payment.validate()?;

        let default_attempt = self
            .breaker
            .execute(|| self.default_processor.process_payment(payment))
            .await;

        match default_attempt {
            Ok(()) => {
                self.record(ProcessorChannel::Default, payment).await;
                return Ok(());
            }
            Err(BreakerError::Open) => {
                debug!(
                    correlation_id = %payment.correlation_id,
                    "default processor short-circuited, trying fallback"
                );
            }
            Err(BreakerError::Inner(e)) => {
                debug!(
                    correlation_id = %payment.correlation_id,
                    error = %e,
                    "default processor failed, trying fallback"
                );
            }
        }

        match self.fallback_processor.process_payment(payment).await {
            Ok(()) => {
                self.record(ProcessorChannel::Fallback, payment).await;
                Ok(())
            }
            Err(fallback_error) => Err(DispatchError::BothProcessorsFailed {
                source: fallback_error,
            }),
        }
    }

    async fn record(&self, channel: ProcessorChannel, payment: &Payment) {
        if let Err(e) = self.repository.record(channel, payment.amount).await {
            warn!(
                channel = %channel,
                correlation_id = %payment.correlation_id,
                error = %e,
                "failed to record payment stats"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::breaker::BreakerConfig;
    use crate::payments::error::ProcessorResult;
    use crate::payments::types::Amount;
    use crate::repository::InMemoryStatsRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct ScriptedProcessor {
        healthy: AtomicBool,
        calls: AtomicU32,
    }

    impl ScriptedProcessor {
        fn new(healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                healthy: AtomicBool::new(healthy),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentProcessor for ScriptedProcessor {
        async fn process_payment(&self, _payment: &Payment) -> ProcessorResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ProcessorError::ErrorStatus { status: 500 })
            }
        }
    }

    fn dispatcher(
        default: Arc<ScriptedProcessor>,
        fallback: Arc<ScriptedProcessor>,
        repository: Arc<InMemoryStatsRepository>,
    ) -> PaymentDispatcher {
        let breaker = Arc::new(CircuitBreaker::new(
            "default-processor",
            BreakerConfig {
                min_requests: 5,
                ..BreakerConfig::default()
            },
        ));
        PaymentDispatcher::new(default, fallback, breaker, repository)
    }

    fn payment() -> Payment {
        Payment::new("c1".to_string(), 10.5).expect("valid payment")
    }

    #[tokio::test]
    async fn healthy_default_records_on_the_default_channel() {
        let default = ScriptedProcessor::new(true);
        let fallback = ScriptedProcessor::new(true);
        let repository = Arc::new(InMemoryStatsRepository::new());
        let dispatcher = dispatcher(default.clone(), fallback.clone(), repository.clone());

        dispatcher.dispatch(&payment()).await.expect("dispatch");

        assert_eq!(default.calls(), 1);
        assert_eq!(fallback.calls(), 0);
        let summary = repository.summary().await.expect("summary");
        assert_eq!(summary.default.total_requests, 1);
        assert_eq!(summary.default.total_amount, Amount::from_cents(1050));
        assert_eq!(summary.fallback.total_requests, 0);
    }

    #[tokio::test]
    async fn failing_default_falls_back_and_records_fallback() {
        let default = ScriptedProcessor::new(false);
        let fallback = ScriptedProcessor::new(true);
        let repository = Arc::new(InMemoryStatsRepository::new());
        let dispatcher = dispatcher(default.clone(), fallback.clone(), repository.clone());

        dispatcher.dispatch(&payment()).await.expect("dispatch");

        assert_eq!(default.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        let summary = repository.summary().await.expect("summary");
        assert_eq!(summary.default.total_requests, 0);
        assert_eq!(summary.fallback.total_requests, 1);
    }

    #[tokio::test]
    async fn both_failing_surfaces_the_fallback_error() {
        let default = ScriptedProcessor::new(false);
        let fallback = ScriptedProcessor::new(false);
        let repository = Arc::new(InMemoryStatsRepository::new());
        let dispatcher = dispatcher(default, fallback, repository.clone());

        let result = dispatcher.dispatch(&payment()).await;
        assert!(matches!(
            result,
            Err(DispatchError::BothProcessorsFailed { .. })
        ));

        let summary = repository.summary().await.expect("summary");
        assert_eq!(summary.default.total_requests, 0);
        assert_eq!(summary.fallback.total_requests, 0);
    }

    #[tokio::test]
    async fn open_breaker_skips_default_and_uses_fallback() {
        let default = ScriptedProcessor::new(false);
        let fallback = ScriptedProcessor::new(true);
        let repository = Arc::new(InMemoryStatsRepository::new());
        let dispatcher = dispatcher(default.clone(), fallback.clone(), repository.clone());

        // Trip the breaker with enough consecutive failures.
        for _ in 0..5 {
            dispatcher.dispatch(&payment()).await.expect("dispatch");
        }
        let calls_at_trip = default.calls();
        assert_eq!(calls_at_trip, 5);

        // While open, the default processor must not be reached.
        for _ in 0..3 {
            dispatcher.dispatch(&payment()).await.expect("dispatch");
        }
        assert_eq!(default.calls(), calls_at_trip);

        let summary = repository.summary().await.expect("summary");
        assert_eq!(summary.fallback.total_requests, 8);
    }

    #[tokio::test]
    async fn invalid_payment_is_rejected_before_any_call() {
        let default = ScriptedProcessor::new(true);
        let fallback = ScriptedProcessor::new(true);
        let repository = Arc::new(InMemoryStatsRepository::new());
        let dispatcher = dispatcher(default.clone(), fallback.clone(), repository);

        let invalid = Payment {
            correlation_id: String::new(),
            amount: Amount::from_cents(100),
        };
        let result = dispatcher.dispatch(&invalid).await;

        assert!(matches!(result, Err(DispatchError::InvalidPayment(_))));
        assert_eq!(default.calls(), 0);
        assert_eq!(fallback.calls(), 0);
    }
}
