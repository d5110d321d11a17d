//! Background dispatch worker pool
//!
//! N workers compete over the shared queue. Each payment is dispatched
//! under a per-payment deadline; failures are re-enqueued to the tail
//! (dropped with a warning if the queue refuses). Workers exit on queue
//! termination or shutdown signal; a worker that panics is logged and
//! replaced.

use crate::config::WorkerConfig;
use crate::payments::types::Payment;
use crate::queue::PaymentQueue;
use crate::services::PaymentDispatcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    pub processing_timeout: Duration,
    pub instance_id: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            processing_timeout: Duration::from_secs(10),
            instance_id: "payrelay-1".to_string(),
        }
    }
}

impl From<&WorkerConfig> for WorkerPoolConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            worker_count: config.count,
            processing_timeout: config.processing_timeout,
            instance_id: config.instance_id.clone(),
        }
    }
}

pub struct DispatchWorkerPool {
    queue: Arc<dyn PaymentQueue>,
    dispatcher: Arc<PaymentDispatcher>,
    config: WorkerPoolConfig,
    started: AtomicBool,
}

impl DispatchWorkerPool {
    pub fn new(
        queue: Arc<dyn PaymentQueue>,
        dispatcher: Arc<PaymentDispatcher>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            config,
            started: AtomicBool::new(false),
        }
    }

    /// Run the pool until the queue terminates or shutdown is signalled.
    /// Calling run on an already-started pool is a no-op.
    pub async fn run(self: Arc<Self>, shutdown_rx: watch::Receiver<bool>) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(instance = %self.config.instance_id, "worker pool already started");
            return;
        }

        info!(
            instance = %self.config.instance_id,
            workers = self.config.worker_count,
            processing_timeout_secs = self.config.processing_timeout.as_secs(),
            "starting dispatch worker pool"
        );

        let mut workers: JoinSet<String> = JoinSet::new();
        let mut next_worker = 0usize;
        for _ in 0..self.config.worker_count.max(1) {
            self.spawn_worker(&mut workers, next_worker, shutdown_rx.clone());
            next_worker += 1;
        }

        while let Some(result) = workers.join_next().await {
            match result {
                Ok(worker_id) => info!(worker = %worker_id, "worker exited"),
                Err(join_error) if join_error.is_panic() => {
                    error!(
                        instance = %self.config.instance_id,
                        error = %join_error,
                        "dispatch worker panicked, restarting"
                    );
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    self.spawn_worker(&mut workers, next_worker, shutdown_rx.clone());
                    next_worker += 1;
                }
                Err(join_error) => {
                    warn!(error = %join_error, "dispatch worker aborted");
                }
            }
        }

        info!(instance = %self.config.instance_id, "dispatch worker pool stopped");
    }

    /// Close the queue so workers drain and exit. Idempotent.
    pub async fn stop(&self) {
        self.queue.close().await;
    }

    fn spawn_worker(
        &self,
        workers: &mut JoinSet<String>,
        index: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) {
        let worker_id = format!("{}-worker-{}", self.config.instance_id, index);
        workers.spawn(worker_loop(
            worker_id,
            Arc::clone(&self.queue),
            Arc::clone(&self.dispatcher),
            self.config.processing_timeout,
            shutdown_rx,
        ));
    }
}

async fn worker_loop(
    worker_id: String,
    queue: Arc<dyn PaymentQueue>,
    dispatcher: Arc<PaymentDispatcher>,
    processing_timeout: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> String {
    info!(worker = %worker_id, "worker started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if !*shutdown_rx.borrow() => continue,
                    _ => {
                        info!(worker = %worker_id, "shutdown signal received, stopping worker");
                        break;
                    }
                }
            }
            received = queue.recv() => {
                let Some(payment) = received else {
                    info!(worker = %worker_id, "payment queue closed, stopping worker");
                    break;
                };
                handle_payment(
                    &worker_id,
                    queue.as_ref(),
                    dispatcher.as_ref(),
                    processing_timeout,
                    payment,
                )
                .await;
            }
        }
    }

    worker_id
}

async fn handle_payment(
    worker_id: &str,
    queue: &dyn PaymentQueue,
    dispatcher: &PaymentDispatcher,
    processing_timeout: Duration,
    payment: Payment,
) {
    let outcome = tokio::time::timeout(processing_timeout, dispatcher.dispatch(&payment)).await;

    let failure = match outcome {
        Ok(Ok(())) => {
            info!(
                worker = %worker_id,
                correlation_id = %payment.correlation_id,
                "payment dispatched"
            );
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => "processing deadline exceeded".to_string(),
    };

    warn!(
        worker = %worker_id,
        correlation_id = %payment.correlation_id,
        error = %failure,
        "dispatch failed, re-enqueueing"
    );

    if let Err(queue_error) = queue.send(payment.clone()).await {
        warn!(
            worker = %worker_id,
            correlation_id = %payment.correlation_id,
            error = %queue_error,
            "re-enqueue failed, dropping payment"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::breaker::{BreakerConfig, CircuitBreaker};
    use crate::payments::error::ProcessorResult;
    use crate::payments::processor::PaymentProcessor;
    use crate::queue::InMemoryQueue;
    use crate::repository::{InMemoryStatsRepository, StatsRepository};
    use async_trait::async_trait;

    struct AlwaysOk;

    #[async_trait]
    impl PaymentProcessor for AlwaysOk {
        async fn process_payment(&self, _payment: &Payment) -> ProcessorResult<()> {
            Ok(())
        }
    }

    fn pool_fixture() -> (
        Arc<DispatchWorkerPool>,
        Arc<InMemoryQueue>,
        Arc<InMemoryStatsRepository>,
    ) {
        let queue = Arc::new(InMemoryQueue::new(16));
        let repository = Arc::new(InMemoryStatsRepository::new());
        let dispatcher = Arc::new(PaymentDispatcher::new(
            Arc::new(AlwaysOk),
            Arc::new(AlwaysOk),
            Arc::new(CircuitBreaker::new("test", BreakerConfig::default())),
            repository.clone(),
        ));
        let pool = Arc::new(DispatchWorkerPool::new(
            queue.clone(),
            dispatcher,
            WorkerPoolConfig {
                worker_count: 2,
                processing_timeout: Duration::from_secs(1),
                instance_id: "test".to_string(),
            },
        ));
        (pool, queue, repository)
    }

    fn payment(id: &str) -> Payment {
        Payment::new(id.to_string(), 10.0).expect("valid payment")
    }

    #[tokio::test]
    async fn workers_drain_a_closed_queue_and_exit() {
        let (pool, queue, repository) = pool_fixture();
        for i in 0..3 {
            queue.send(payment(&format!("p{}", i))).await.expect("send");
        }
        queue.close().await;

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::time::timeout(Duration::from_secs(5), pool.run(shutdown_rx))
            .await
            .expect("pool drains and stops");

        let summary = repository.summary().await.expect("summary");
        assert_eq!(summary.default.total_requests, 3);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_idle_workers() {
        let (pool, _queue, _repository) = pool_fixture();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(pool.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).expect("signal shutdown");

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("pool stops on signal")
            .expect("pool task joins");
    }

    #[tokio::test]
    async fn second_run_call_is_a_no_op() {
        let (pool, queue, _repository) = pool_fixture();
        queue.close().await;

        let (_tx, rx) = watch::channel(false);
        pool.clone().run(rx.clone()).await;
        // Already started; returns immediately instead of spawning again.
        tokio::time::timeout(Duration::from_millis(200), pool.run(rx))
            .await
            .expect("no-op run returns");
    }
}
