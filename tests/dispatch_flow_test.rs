//! End-to-end pipeline tests over the in-memory stack: intake → queue →
//! worker pool → breaker-guarded routing → statistics repository.

use async_trait::async_trait;
use payrelay::payments::breaker::{BreakerConfig, CircuitBreaker};
use payrelay::payments::error::{ProcessorError, ProcessorResult};
use payrelay::payments::processor::PaymentProcessor;
use payrelay::payments::types::{Payment, PaymentsSummary};
use payrelay::queue::{InMemoryQueue, PaymentQueue};
use payrelay::repository::{InMemoryStatsRepository, StatsRepository};
use payrelay::services::{IntakeService, PaymentDispatcher};
use payrelay::store::InMemoryDedupStore;
use payrelay::workers::{DispatchWorkerPool, WorkerPoolConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct ScriptedProcessor {
    healthy: AtomicBool,
    panic_next: AtomicBool,
    calls: AtomicU32,
}

impl ScriptedProcessor {
    fn new(healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(healthy),
            panic_next: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        })
    }

    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn panic_on_next_call(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn process_payment(&self, _payment: &Payment) -> ProcessorResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("scripted processor panic");
        }
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProcessorError::ErrorStatus { status: 500 })
        }
    }
}

struct Pipeline {
    intake: IntakeService,
    queue: Arc<InMemoryQueue>,
    repository: Arc<InMemoryStatsRepository>,
    shutdown_tx: watch::Sender<bool>,
    pool_handle: JoinHandle<()>,
}

impl Pipeline {
    async fn submit(&self, correlation_id: &str, amount: f64) {
        let payment = Payment::new(correlation_id.to_string(), amount).expect("valid payment");
        self.intake.submit(payment).await.expect("submit");
    }

    async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        self.queue.close().await;
        tokio::time::timeout(Duration::from_secs(5), self.pool_handle)
            .await
            .expect("pool stops")
            .expect("pool task joins");
    }
}

fn start_pipeline(
    default: Arc<ScriptedProcessor>,
    fallback: Arc<ScriptedProcessor>,
    breaker_config: BreakerConfig,
    worker_count: usize,
) -> Pipeline {
    let queue = Arc::new(InMemoryQueue::new(64));
    let repository = Arc::new(InMemoryStatsRepository::new());
    let store = Arc::new(InMemoryDedupStore::new(None));

    let breaker = Arc::new(CircuitBreaker::new("default-processor", breaker_config));
    let dispatcher = Arc::new(PaymentDispatcher::new(
        default,
        fallback,
        breaker,
        repository.clone(),
    ));

    let pool = Arc::new(DispatchWorkerPool::new(
        queue.clone(),
        dispatcher,
        WorkerPoolConfig {
            worker_count,
            processing_timeout: Duration::from_secs(2),
            instance_id: "test".to_string(),
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool_handle = tokio::spawn(pool.run(shutdown_rx));

    Pipeline {
        intake: IntakeService::new(store, queue.clone(), "test"),
        queue,
        repository,
        shutdown_tx,
        pool_handle,
    }
}

fn lenient_breaker() -> BreakerConfig {
    BreakerConfig {
        max_requests: 1,
        interval: Duration::from_secs(60),
        timeout: Duration::from_secs(60),
        failure_ratio: 0.5,
        min_requests: 100,
    }
}

async fn wait_for_summary<F>(repository: &Arc<InMemoryStatsRepository>, predicate: F) -> PaymentsSummary
where
    F: Fn(&PaymentsSummary) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let summary = repository.summary().await.expect("summary");
        if predicate(&summary) {
            return summary;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time: {:?}",
            summary
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn happy_path_records_on_the_default_channel() {
    let default = ScriptedProcessor::new(true);
    let fallback = ScriptedProcessor::new(true);
    let pipeline = start_pipeline(default.clone(), fallback.clone(), lenient_breaker(), 4);

    pipeline.submit("c1", 10.5).await;

    let summary = wait_for_summary(&pipeline.repository, |s| s.default.total_requests == 1).await;
    assert_eq!(summary.default.total_amount.cents(), 1050);
    assert_eq!(summary.fallback.total_requests, 0);
    assert_eq!(fallback.calls(), 0);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn failing_default_routes_through_fallback() {
    let default = ScriptedProcessor::new(false);
    let fallback = ScriptedProcessor::new(true);
    let pipeline = start_pipeline(default.clone(), fallback.clone(), lenient_breaker(), 4);

    pipeline.submit("c2", 7.0).await;

    let summary = wait_for_summary(&pipeline.repository, |s| s.fallback.total_requests == 1).await;
    assert_eq!(summary.default.total_requests, 0);
    assert_eq!(summary.fallback.total_amount.cents(), 700);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn payment_is_retried_until_a_processor_recovers() {
    let default = ScriptedProcessor::new(false);
    let fallback = ScriptedProcessor::new(false);
    let pipeline = start_pipeline(default.clone(), fallback.clone(), lenient_breaker(), 2);

    pipeline.submit("c3", 3.0).await;

    // Both processors down: the payment cycles through re-enqueue.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while default.calls() < 2 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "payment was not retried"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    default.set_healthy(true);

    let summary = wait_for_summary(&pipeline.repository, |s| {
        s.default.total_requests + s.fallback.total_requests == 1
    })
    .await;
    assert_eq!(summary.default.total_requests, 1);
    assert_eq!(summary.default.total_amount.cents(), 300);

    // Exactly one record for the payment despite the retries.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = pipeline.repository.summary().await.expect("summary");
    assert_eq!(
        settled.default.total_requests + settled.fallback.total_requests,
        1
    );

    pipeline.shutdown().await;
}

#[tokio::test]
async fn open_breaker_diverts_traffic_to_fallback_until_recovery() {
    let breaker_config = BreakerConfig {
        max_requests: 1,
        interval: Duration::from_secs(10),
        timeout: Duration::from_secs(1),
        failure_ratio: 0.5,
        min_requests: 5,
    };
    let default = ScriptedProcessor::new(false);
    let fallback = ScriptedProcessor::new(true);
    let pipeline = start_pipeline(default.clone(), fallback.clone(), breaker_config, 1);

    // Five consecutive default failures trip the breaker.
    for i in 0..5 {
        pipeline.submit(&format!("trip-{}", i), 1.0).await;
    }
    wait_for_summary(&pipeline.repository, |s| s.fallback.total_requests == 5).await;
    assert_eq!(default.calls(), 5);

    // While open, traffic goes straight to the fallback.
    for i in 0..3 {
        pipeline.submit(&format!("open-{}", i), 1.0).await;
    }
    wait_for_summary(&pipeline.repository, |s| s.fallback.total_requests == 8).await;
    assert_eq!(default.calls(), 5, "no call reaches default while open");

    // After the cooldown a healthy probe closes the breaker again.
    default.set_healthy(true);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    pipeline.submit("probe", 2.0).await;

    let summary = wait_for_summary(&pipeline.repository, |s| s.default.total_requests == 1).await;
    assert_eq!(summary.default.total_amount.cents(), 200);
    assert_eq!(default.calls(), 6);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn worker_pool_survives_a_panicking_dispatch() {
    let default = ScriptedProcessor::new(true);
    let fallback = ScriptedProcessor::new(true);
    let pipeline = start_pipeline(default.clone(), fallback.clone(), lenient_breaker(), 1);

    default.panic_on_next_call();
    pipeline.submit("poison", 1.0).await;

    // The panicked worker is replaced and keeps consuming the queue.
    tokio::time::sleep(Duration::from_millis(100)).await;
    pipeline.submit("after-panic", 4.0).await;

    let summary = wait_for_summary(&pipeline.repository, |s| s.default.total_requests == 1).await;
    assert_eq!(summary.default.total_amount.cents(), 400);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn distinct_payments_are_all_accounted_for() {
    let default = ScriptedProcessor::new(true);
    let fallback = ScriptedProcessor::new(true);
    let pipeline = start_pipeline(default.clone(), fallback.clone(), lenient_breaker(), 4);

    let mut expected_cents = 0i64;
    for i in 0..20 {
        let amount = 1.0 + i as f64;
        expected_cents += (amount * 100.0) as i64;
        pipeline.submit(&format!("bulk-{}", i), amount).await;
    }

    let summary = wait_for_summary(&pipeline.repository, |s| {
        s.default.total_requests + s.fallback.total_requests == 20
    })
    .await;
    assert_eq!(
        summary
            .default
            .total_amount
            .saturating_add(summary.fallback.total_amount)
            .cents(),
        expected_cents
    );

    pipeline.shutdown().await;
}
