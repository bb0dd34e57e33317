use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::EngineConfig;
use crate::decide::decide_all;
use crate::error::{ErrorSeverity, HedgeError};
use crate::execute::execute;
use crate::notify::Notifier;
use crate::pool::{PoolEntry, PoolReader};
use crate::prepare::prepare;
use crate::rate_limiter::RateLimiter;
use crate::report::report;
use crate::state::StateStore;
use crate::venue::VenueAdapter;

const BACKOFF_CAP_SECS: u64 = 300;

struct PoolSlot {
    name: String,
    reader: Box<dyn PoolReader>,
    lp_amount: f64,
}

/// Owns every collaborator and drives `Prepare -> Decide -> Execute ->
/// Report` on a fixed cadence. Applies exponential backoff on recoverable
/// errors, sleeps out circuit-open windows, and terminates on critical
/// errors or after `max_consecutive_errors`.
pub struct CycleRunner {
    config: EngineConfig,
    store: StateStore,
    venue: Box<dyn VenueAdapter>,
    notifier: Box<dyn Notifier>,
    pools: Vec<PoolSlot>,
    venue_breaker: CircuitBreaker,
    pool_breaker: CircuitBreaker,
    notifier_breaker: CircuitBreaker,
    venue_limiter: RateLimiter,
    pool_limiter: RateLimiter,
    notifier_limiter: RateLimiter,
    consecutive_errors: u32,
}

impl CycleRunner {
    pub fn new(config: EngineConfig, venue: Box<dyn VenueAdapter>, notifier: Box<dyn Notifier>) -> Self {
        let venue_breaker = CircuitBreaker::new("venue", config.venue_circuit_breaker.clone());
        let pool_breaker = CircuitBreaker::new("pool", config.pool_circuit_breaker.clone());
        let notifier_breaker = CircuitBreaker::new("notifier", config.notifier_circuit_breaker.clone());
        let venue_limiter = RateLimiter::new(config.venue_rate_limiter.max_tokens, config.venue_rate_limiter.refill_rate);
        let pool_limiter = RateLimiter::new(config.pool_rate_limiter.max_tokens, config.pool_rate_limiter.refill_rate);
        let notifier_limiter = RateLimiter::new(config.notifier_rate_limiter.max_tokens, config.notifier_rate_limiter.refill_rate);
        Self {
            config,
            store: StateStore::new(),
            venue,
            notifier,
            pools: Vec::new(),
            venue_breaker,
            pool_breaker,
            notifier_breaker,
            venue_limiter,
            pool_limiter,
            notifier_limiter,
            consecutive_errors: 0,
        }
    }

    pub fn with_pool(mut self, name: impl Into<String>, reader: Box<dyn PoolReader>, lp_amount: f64) -> Self {
        self.pools.push(PoolSlot { name: name.into(), reader, lp_amount });
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    async fn run_cycle(&mut self) -> Result<(), HedgeError> {
        self.pool_breaker.before_call()?;
        self.venue_breaker.before_call()?;
        self.pool_limiter.acquire(1.0).await;
        self.venue_limiter.acquire(1.0).await;

        let started = Instant::now();
        let pool_entries: Vec<PoolEntry> =
            self.pools.iter().map(|p| PoolEntry { name: &p.name, reader: p.reader.as_ref(), lp_amount: p.lp_amount }).collect();

        let result = prepare(&pool_entries, self.venue.as_ref(), &self.store, &self.config).await;
        let prepared = match result {
            Ok(p) => {
                self.pool_breaker.record_success();
                self.venue_breaker.record_success();
                p
            }
            Err(e) => {
                self.pool_breaker.record_failure();
                self.venue_breaker.record_failure();
                return Err(e);
            }
        };

        let actions = decide_all(&prepared, &self.store, &self.config);
        let call_timeout = Duration::from_secs(self.config.venue_timeout_secs);
        let summary = execute(actions, self.venue.as_ref(), &self.store, self.notifier.as_ref(), call_timeout).await;
        if summary.failure_count() > 0 {
            self.venue_breaker.record_failure();
        } else {
            self.venue_breaker.record_success();
        }

        let cycle_number = self.store.increment_cycle_count();
        report(cycle_number, started.elapsed(), &prepared, &summary);
        Ok(())
    }

    /// Drives cycles on `cycle_interval_secs` until `shutdown` is set to
    /// `true`. In-flight Executor work always completes; the next cycle
    /// simply does not start.
    pub async fn run_forever(mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.cycle_interval_secs);
        let cycle_timeout = interval * 2;

        loop {
            if *shutdown.borrow() {
                log::info!("shutdown requested, stopping cycle runner");
                return;
            }

            let outcome = tokio::time::timeout(cycle_timeout, self.run_cycle()).await;
            match outcome {
                Ok(Ok(())) => {
                    self.consecutive_errors = 0;
                }
                Ok(Err(e)) => {
                    if self.handle_error(&e).await {
                        return;
                    }
                }
                Err(_) => {
                    let timeout_err = HedgeError::Unknown("cycle exceeded 2x interval timeout".to_string());
                    if self.handle_error(&timeout_err).await {
                        return;
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    /// Returns `true` if the runner should terminate.
    async fn handle_error(&mut self, error: &HedgeError) -> bool {
        self.consecutive_errors += 1;
        log::error!("cycle error ({}/{}): {error}", self.consecutive_errors, self.config.max_consecutive_errors);

        if error.should_notify() && self.notifier_breaker.before_call().is_ok() {
            if self.notifier_limiter.try_acquire(1.0).await {
                self.notifier.notify_system_error(&error.to_string()).await;
                self.notifier_breaker.record_success();
            } else {
                log::debug!("notifier rate limit exhausted, suppressing system error notification");
            }
        }

        if error.severity() == ErrorSeverity::Critical {
            log::error!("critical error, shutting down: {error}");
            return true;
        }
        if self.consecutive_errors >= self.config.max_consecutive_errors {
            log::error!("max_consecutive_errors ({}) reached, shutting down", self.config.max_consecutive_errors);
            return true;
        }

        if let HedgeError::CircuitOpen { reset_after_secs, .. } = error {
            tokio::time::sleep(Duration::from_secs(*reset_after_secs)).await;
            return false;
        }

        let retries = self.consecutive_errors.min(error.max_retries().max(1));
        let backoff_secs = (error.retry_after_secs() * 2u64.pow(retries.saturating_sub(1))).min(BACKOFF_CAP_SECS);
        if backoff_secs > 0 {
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
        }
        false
    }
}
