//! Sliding window rate limiter
//!
//! Per-identity admission control over a trailing time window. Identities
//! live in a sharded concurrent map; the read-prune-compare-append for one
//! identity runs while holding that identity's shard guard, so concurrent
//! callers for the same identity are linearized while different identities
//! proceed in parallel.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::domain::Clock;
use crate::infrastructure::observability::record_limiter_sweep;

/// Shortest sweep period accepted by [`SlidingWindowLimiter::spawn_sweeper`]
const MIN_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

/// Rate limiter keyed by caller identity
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    /// Admitted request timestamps per identity
    entries: DashMap<String, VecDeque<DateTime<Utc>>>,
    /// Max admitted requests per window
    limit: u32,
    window: Duration,
}

impl SlidingWindowLimiter {
    /// Create a new limiter
    ///
    /// A zero `limit` or a non-positive `window` produces a limiter that
    /// denies every request.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window,
        }
    }

    /// Create a limiter from configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let window = i64::try_from(config.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        Self::new(config.requests_per_window, window)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether this limiter was configured to refuse everything
    pub fn denies_all(&self) -> bool {
        self.limit == 0 || self.window <= Duration::zero()
    }

    /// Decide whether a request from `identity` at `now` is admitted
    ///
    /// Admitted requests are recorded; denied ones only prune.
    pub fn allow(&self, identity: &str, now: DateTime<Utc>) -> bool {
        if identity.is_empty() {
            debug!("Rate limiter denied request with empty identity");
            return false;
        }

        if self.denies_all() {
            debug!(identity, "Rate limiter configured to deny all requests");
            return false;
        }

        let cutoff = self.cutoff(now);
        let limit = self.limit as usize;

        let mut timestamps = self.entries.entry(identity.to_string()).or_default();
        timestamps.retain(|t| *t > cutoff);

        if timestamps.len() < limit {
            timestamps.push_back(now);
            true
        } else {
            debug!(identity, limit, "Rate limit exceeded");
            false
        }
    }

    /// Prune every identity and evict those with nothing left in the window
    ///
    /// Returns the number of evicted identities.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = self.cutoff(now);
        let mut evicted = 0;

        self.entries.retain(|_, timestamps| {
            timestamps.retain(|t| *t > cutoff);

            if timestamps.is_empty() {
                evicted += 1;
                false
            } else {
                true
            }
        });

        evicted
    }

    /// Oldest instant still outside the window
    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Number of identities currently held in memory
    pub fn tracked_identities(&self) -> usize {
        self.entries.len()
    }

    /// Start the periodic sweep
    ///
    /// The task runs until [`SweeperHandle::shutdown`] is awaited or the
    /// handle is dropped.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        clock: Arc<dyn Clock>,
        every: std::time::Duration,
    ) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let period = every.max(MIN_SWEEP_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("Rate limiter sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = self.sweep(clock.now());
                        let remaining = self.tracked_identities();
                        record_limiter_sweep(evicted, remaining);

                        if evicted > 0 {
                            debug!(evicted, remaining, "Evicted idle rate limit entries");
                        }
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Owner of the background sweep task
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Rate limiter sweeper ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ManualClock;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    #[test]
    fn test_window_admits_then_denies_then_recovers() {
        let limiter = SlidingWindowLimiter::new(3, Duration::seconds(60));

        assert!(limiter.allow("X", at(0)));
        assert!(limiter.allow("X", at(0)));
        assert!(limiter.allow("X", at(0)));

        assert!(!limiter.allow("X", at(10)));

        assert!(limiter.allow("X", at(61)));
    }

    #[test]
    fn test_timestamp_at_exact_cutoff_is_outside_window() {
        let limiter = SlidingWindowLimiter::new(1, Duration::seconds(60));

        assert!(limiter.allow("X", at(0)));
        assert!(!limiter.allow("X", at(59)));
        assert!(limiter.allow("X", at(60)));
    }

    #[test]
    fn test_denial_does_not_extend_window() {
        let limiter = SlidingWindowLimiter::new(1, Duration::seconds(60));

        assert!(limiter.allow("X", at(0)));
        for secs in 1..60 {
            assert!(!limiter.allow("X", at(secs)));
        }

        assert!(limiter.allow("X", at(60)));
    }

    #[test]
    fn test_identities_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::seconds(60));

        assert!(limiter.allow("10.0.0.1", at(0)));
        assert!(limiter.allow("10.0.0.2", at(0)));
        assert!(!limiter.allow("10.0.0.1", at(1)));
    }

    #[test]
    fn test_zero_limit_denies_all() {
        let limiter = SlidingWindowLimiter::new(0, Duration::seconds(60));

        assert!(limiter.denies_all());
        for secs in 0..10 {
            assert!(!limiter.allow("X", at(secs)));
        }
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[test]
    fn test_non_positive_window_denies_all() {
        let zero = SlidingWindowLimiter::new(10, Duration::zero());
        let negative = SlidingWindowLimiter::new(10, Duration::seconds(-5));

        assert!(!zero.allow("X", at(0)));
        assert!(!negative.allow("X", at(0)));
    }

    #[test]
    fn test_empty_identity_is_denied() {
        let limiter = SlidingWindowLimiter::new(10, Duration::seconds(60));

        assert!(!limiter.allow("", at(0)));
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[test]
    fn test_at_most_limit_in_any_window() {
        let limit = 4;
        let window = Duration::seconds(10);
        let limiter = SlidingWindowLimiter::new(limit, window);
        let mut admitted = Vec::new();

        // Irregular arrival pattern over several windows
        let mut now = t0();
        for i in 0..500 {
            now += Duration::milliseconds([150, 900, 40, 2_300, 10][i % 5]);
            if limiter.allow("X", now) {
                admitted.push(now);
            }
        }

        for &end in &admitted {
            let in_window = admitted
                .iter()
                .filter(|&&t| t > end - window && t <= end)
                .count();
            assert!(in_window <= limit as usize);
        }
        assert!(!admitted.is_empty());
    }

    #[test]
    fn test_sweep_evicts_idle_identities() {
        let limiter = SlidingWindowLimiter::new(5, Duration::seconds(60));

        limiter.allow("idle", at(0));
        limiter.allow("busy", at(0));
        limiter.allow("busy", at(50));

        assert_eq!(limiter.sweep(at(70)), 1);
        assert_eq!(limiter.tracked_identities(), 1);

        assert_eq!(limiter.sweep(at(200)), 1);
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[test]
    fn test_sweep_keeps_counts_accurate() {
        let limiter = SlidingWindowLimiter::new(2, Duration::seconds(60));

        assert!(limiter.allow("X", at(0)));
        assert!(limiter.allow("X", at(30)));
        limiter.sweep(at(65));

        // The t=30 admission is still inside the window
        assert!(limiter.allow("X", at(65)));
        assert!(!limiter.allow("X", at(66)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_callers_respect_limit() {
        let limiter = Arc::new(SlidingWindowLimiter::new(5, Duration::seconds(60)));
        let now = at(0);

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.allow("X", now) })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;
        let admitted = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();

        assert_eq!(admitted, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_last_slot_goes_to_exactly_one_caller() {
        let limiter = Arc::new(SlidingWindowLimiter::new(3, Duration::seconds(60)));
        assert!(limiter.allow("X", at(0)));
        assert!(limiter.allow("X", at(0)));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.allow("X", at(1)) })
            })
            .collect();

        let admitted = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();

        assert_eq!(admitted, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sweep_racing_allow_never_loses_admissions() {
        let limiter = Arc::new(SlidingWindowLimiter::new(1_000, Duration::seconds(60)));

        // Stale entries that every sweep wants to evict
        for i in 0..200 {
            limiter.allow(&format!("client-{}", i), at(0));
        }

        let sweeper = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    limiter.sweep(at(120));
                    tokio::task::yield_now().await;
                }
            })
        };

        let writers: Vec<_> = (0..200)
            .map(|i| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.allow(&format!("client-{}", i), at(120)) })
            })
            .collect();

        for writer in futures::future::join_all(writers).await {
            assert!(writer.unwrap());
        }
        sweeper.await.unwrap();

        // Each fresh admission survives any later sweep at the same instant
        limiter.sweep(at(120));
        assert_eq!(limiter.tracked_identities(), 200);
    }

    #[tokio::test]
    async fn test_sweeper_runs_and_shuts_down() {
        let clock = Arc::new(ManualClock::new(t0()));
        let limiter = Arc::new(SlidingWindowLimiter::new(5, Duration::seconds(60)));

        limiter.allow("X", t0());
        assert_eq!(limiter.tracked_identities(), 1);

        let handle = limiter
            .clone()
            .spawn_sweeper(clock.clone(), std::time::Duration::from_millis(10));

        clock.advance(Duration::seconds(120));

        let mut evicted = false;
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if limiter.tracked_identities() == 0 {
                evicted = true;
                break;
            }
        }
        assert!(evicted);

        tokio::time::timeout(std::time::Duration::from_secs(1), handle.shutdown())
            .await
            .expect("sweeper did not stop");
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_sweeper() {
        let clock = Arc::new(ManualClock::new(t0()));
        let limiter = Arc::new(SlidingWindowLimiter::new(5, Duration::seconds(60)));

        let handle = limiter
            .clone()
            .spawn_sweeper(clock, std::time::Duration::from_millis(10));
        drop(handle);

        // The task held the only other reference
        for _ in 0..100 {
            if Arc::strong_count(&limiter) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(Arc::strong_count(&limiter), 1);
    }

    #[test]
    fn test_from_config() {
        let config = RateLimitConfig {
            requests_per_window: 60,
            window_secs: 60,
            ..RateLimitConfig::default()
        };

        let limiter = SlidingWindowLimiter::from_config(&config);
        assert_eq!(limiter.limit(), 60);
        assert_eq!(limiter.window(), Duration::seconds(60));
    }
}
