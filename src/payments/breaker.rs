//! Circuit breaker guarding the default processor path.
//!
//! Closed counts outcomes inside a rolling `interval` window and trips to
//! Open once `min_requests` have been seen and the failure ratio reaches
//! `failure_ratio`. Open rejects everything until `timeout` elapses, then
//! HalfOpen admits up to `max_requests` probes; that many consecutive
//! successes close the breaker, any failure reopens it. Results from a
//! previous generation (an earlier window or state) are discarded.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::info;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerState::Closed => f.write_str("closed"),
            BreakerState::Open => f.write_str("open"),
            BreakerState::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Probe budget while half-open; also the consecutive-success count
    /// required to close.
    pub max_requests: u32,
    /// Closed-state counter window. Zero disables the rollover.
    pub interval: Duration,
    /// Cooldown before an open breaker admits probes again.
    pub timeout: Duration,
    /// Failure ratio that trips the breaker.
    pub failure_ratio: f64,
    /// Minimum samples in the window before the ratio is considered.
    pub min_requests: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            failure_ratio: 0.5,
            min_requests: 5,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    requests: u32,
    total_failures: u32,
    consecutive_successes: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests += 1;
    }

    fn on_success(&mut self) {
        self.consecutive_successes += 1;
    }

    fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_successes = 0;
    }
}

struct Shared {
    state: BreakerState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

type StateChangeHook = Box<dyn Fn(BreakerState, BreakerState) + Send + Sync>;

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without running it.
    Open,
    /// The call ran and failed with the inner error.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => f.write_str("circuit breaker is open"),
            BreakerError::Inner(err) => err.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BreakerError::Open => None,
            BreakerError::Inner(err) => Some(err),
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    shared: Mutex<Shared>,
    on_state_change: Option<StateChangeHook>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let expiry =
            (!config.interval.is_zero()).then(|| Instant::now() + config.interval);

        Self {
            name: name.into(),
            config,
            shared: Mutex::new(Shared {
                state: BreakerState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            }),
            on_state_change: None,
        }
    }

    /// Install a hook invoked with `(old, new)` on every state change.
    pub fn with_state_change_hook(
        mut self,
        hook: impl Fn(BreakerState, BreakerState) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Box::new(hook));
        self
    }

    /// Current state, rolling expired windows and cooldowns forward first.
    pub fn state(&self) -> BreakerState {
        let mut shared = self.locked();
        let transition = self.refresh(&mut shared, Instant::now());
        let state = shared.state;
        drop(shared);
        self.notify(transition);
        state
    }

    /// Run `call` under the breaker. Rejected calls return
    /// [`BreakerError::Open`] without invoking the closure.
    pub async fn execute<T, E, F, Fut>(&self, call: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = match self.before_call() {
            Some(generation) => generation,
            None => return Err(BreakerError::Open),
        };

        match call().await {
            Ok(value) => {
                self.after_call(generation, true);
                Ok(value)
            }
            Err(err) => {
                self.after_call(generation, false);
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn locked(&self) -> MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn before_call(&self) -> Option<u64> {
        let mut shared = self.locked();
        let transition = self.refresh(&mut shared, Instant::now());

        let admitted = match shared.state {
            BreakerState::Closed => {
                shared.counts.on_request();
                Some(shared.generation)
            }
            BreakerState::Open => None,
            BreakerState::HalfOpen => {
                if shared.counts.requests >= self.config.max_requests {
                    None
                } else {
                    shared.counts.on_request();
                    Some(shared.generation)
                }
            }
        };

        drop(shared);
        self.notify(transition);
        admitted
    }

    fn after_call(&self, generation: u64, success: bool) {
        let mut shared = self.locked();
        let now = Instant::now();
        let mut transition = self.refresh(&mut shared, now);

        // A result from an earlier window or state says nothing about the
        // current one.
        if shared.generation == generation {
            let outcome = if success {
                self.on_success(&mut shared, now)
            } else {
                self.on_failure(&mut shared, now)
            };
            transition = transition.or(outcome);
        }

        drop(shared);
        self.notify(transition);
    }

    fn refresh(
        &self,
        shared: &mut Shared,
        now: Instant,
    ) -> Option<(BreakerState, BreakerState)> {
        match shared.state {
            BreakerState::Closed => {
                if shared.expiry.is_some_and(|expiry| now >= expiry) {
                    self.new_generation(shared, now);
                }
                None
            }
            BreakerState::Open => {
                if shared.expiry.is_some_and(|expiry| now >= expiry) {
                    self.set_state(shared, BreakerState::HalfOpen, now)
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => None,
        }
    }

    fn on_success(
        &self,
        shared: &mut Shared,
        now: Instant,
    ) -> Option<(BreakerState, BreakerState)> {
        match shared.state {
            BreakerState::Closed => {
                shared.counts.on_success();
                None
            }
            BreakerState::HalfOpen => {
                shared.counts.on_success();
                if shared.counts.consecutive_successes >= self.config.max_requests {
                    self.set_state(shared, BreakerState::Closed, now)
                } else {
                    None
                }
            }
            BreakerState::Open => None,
        }
    }

    fn on_failure(
        &self,
        shared: &mut Shared,
        now: Instant,
    ) -> Option<(BreakerState, BreakerState)> {
        match shared.state {
            BreakerState::Closed => {
                shared.counts.on_failure();
                if self.ready_to_trip(&shared.counts) {
                    self.set_state(shared, BreakerState::Open, now)
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => self.set_state(shared, BreakerState::Open, now),
            BreakerState::Open => None,
        }
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        counts.requests >= self.config.min_requests
            && counts.total_failures as f64 / counts.requests as f64 >= self.config.failure_ratio
    }

    fn set_state(
        &self,
        shared: &mut Shared,
        new: BreakerState,
        now: Instant,
    ) -> Option<(BreakerState, BreakerState)> {
        if shared.state == new {
            return None;
        }

        let old = shared.state;
        shared.state = new;
        self.new_generation(shared, now);
        Some((old, new))
    }

    fn new_generation(&self, shared: &mut Shared, now: Instant) {
        shared.generation += 1;
        shared.counts = Counts::default();
        shared.expiry = match shared.state {
            BreakerState::Closed => {
                (!self.config.interval.is_zero()).then(|| now + self.config.interval)
            }
            BreakerState::Open => Some(now + self.config.timeout),
            BreakerState::HalfOpen => None,
        };
    }

    fn notify(&self, transition: Option<(BreakerState, BreakerState)>) {
        if let Some((old, new)) = transition {
            info!(
                breaker = %self.name,
                from = %old,
                to = %new,
                "circuit breaker state changed"
            );
            if let Some(hook) = &self.on_state_change {
                hook(old, new);
            }
        }
    }
}
