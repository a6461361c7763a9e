//! Concurrent processing utilities for domain probing.
//!
//! Two independent throttles compose here:
//!
//! - [`ConcurrentProcessor`] bounds the number of in-flight per-domain executions
//!   and yields their results in completion order.
//! - [`RequestThrottle`] bounds how many individual URL attempts may start per
//!   second. It is awaited by the prober before every request, so a domain that
//!   falls back from HTTPS to HTTP consumes two permits.
//!
//! Progress is exposed through a shared counter ([`ProgressHandle`]) that is
//! incremented as each domain completes.

use futures::future;
use futures::stream::{self, Stream, StreamExt};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Issuance-rate limiter for individual URL attempts.
///
/// Attempts are spaced `1s / per_second` apart with no burst, so any
/// one-second window holds at most `per_second` of them.
pub struct RequestThrottle {
    limiter: DirectRateLimiter,
    per_second: NonZeroU32,
}

impl RequestThrottle {
    /// Create a throttle allowing `per_second` attempts per second (minimum 1).
    pub fn per_second(per_second: u32) -> Self {
        let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(Duration::from_secs(1) / per_second.get())
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .unwrap_or_else(|| Quota::per_second(per_second));
        Self {
            limiter: RateLimiter::direct(quota),
            per_second,
        }
    }

    /// Wait until the next attempt may be issued.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub fn rate(&self) -> u32 {
        self.per_second.get()
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("per_second", &self.per_second)
            .finish()
    }
}

/// Read-only view of a run's progress.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    completed: Arc<AtomicUsize>,
}

impl ProgressHandle {
    /// Number of domains whose protocol has completed so far. Never decreases.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Runs a per-domain task across a domain list under a concurrency ceiling.
///
/// Every domain is scheduled at most once and yields exactly one result, unless
/// the run is cancelled, in which case domains not yet started are never issued.
/// Results arrive in completion order, not input order.
pub struct ConcurrentProcessor {
    max_workers: usize,
    completed: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl ConcurrentProcessor {
    /// Create a new concurrent processor with at least one worker.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            completed: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token (e.g. wired to Ctrl-C).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn progress(&self) -> ProgressHandle {
        ProgressHandle {
            completed: Arc::clone(&self.completed),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop issuing new domains. Executions already in flight run to completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `task` for every domain, at most `max_workers` at a time.
    ///
    /// The returned stream is lazy: nothing is issued until it is polled. Each
    /// item pairs the domain with the value its task produced.
    pub fn run_all<'a, T, F, Fut>(
        &'a self,
        domains: Vec<String>,
        task: F,
    ) -> Pin<Box<dyn Stream<Item = (String, T)> + Send + 'a>>
    where
        F: Fn(String) -> Fut + Send + Sync + 'a,
        Fut: Future<Output = T> + Send + 'a,
        T: Send + 'a,
    {
        let cancel = self.cancel.clone();
        let completed = Arc::clone(&self.completed);

        let stream = stream::iter(domains)
            // Checked lazily: buffer_unordered only pulls the next domain when a slot frees
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(move |domain| {
                let run = task(domain.clone());
                let completed = Arc::clone(&completed);
                async move {
                    let output = run.await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    (domain, output)
                }
            })
            .buffer_unordered(self.max_workers);

        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Instant;

    fn domains(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("site{}.test", i)).collect()
    }

    #[tokio::test]
    async fn test_every_domain_yields_exactly_one_result() {
        let processor = ConcurrentProcessor::new(4);
        let results: Vec<(String, usize)> = processor
            .run_all(domains(25), |d| async move { d.len() })
            .collect()
            .await;

        assert_eq!(results.len(), 25);
        let unique: HashSet<_> = results.iter().map(|(d, _)| d.clone()).collect();
        assert_eq!(unique.len(), 25);
        assert_eq!(processor.progress().completed(), 25);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_max_workers() {
        for max_workers in [1, 3, 8] {
            let in_flight = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let processor = ConcurrentProcessor::new(max_workers);

            let count = processor
                .run_all(domains(30), |_| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    }
                })
                .count()
                .await;

            assert_eq!(count, 30);
            assert!(peak.load(Ordering::SeqCst) <= max_workers);
            assert!(peak.load(Ordering::SeqCst) >= 1);
        }
    }

    #[tokio::test]
    async fn test_results_arrive_in_completion_order() {
        let processor = ConcurrentProcessor::new(2);
        let input = vec!["slow.test".to_string(), "fast.test".to_string()];
        let order: Vec<String> = processor
            .run_all(input, |d| async move {
                let delay = if d.starts_with("slow") { 80 } else { 5 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
            })
            .map(|(d, _)| d)
            .collect()
            .await;

        assert_eq!(order, vec!["fast.test".to_string(), "slow.test".to_string()]);
    }

    #[tokio::test]
    async fn test_progress_is_incremental() {
        let processor = ConcurrentProcessor::new(1);
        let progress = processor.progress();
        let mut stream = processor.run_all(domains(3), |_| async {});

        let mut seen = Vec::new();
        while stream.next().await.is_some() {
            seen.push(progress.completed());
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cancel_stops_issuing_new_domains() {
        let processor = ConcurrentProcessor::new(1);
        let token = processor.cancellation_token();
        let started = Arc::new(AtomicUsize::new(0));

        let mut stream = processor.run_all(domains(10), |_| {
            let started = Arc::clone(&started);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(stream.next().await.is_some());
        token.cancel();
        let rest: Vec<_> = stream.collect().await;

        // Anything already pulled into the buffer may finish; nothing new starts.
        assert!(rest.len() <= 1);
        assert!(started.load(Ordering::SeqCst) <= 2);
        assert!(processor.is_cancelled());
    }

    #[tokio::test]
    async fn test_empty_domain_list_runs_nothing() {
        let processor = ConcurrentProcessor::new(4);
        let called = Arc::new(AtomicUsize::new(0));
        let results: Vec<_> = processor
            .run_all(Vec::new(), |_| {
                let called = Arc::clone(&called);
                async move {
                    called.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect()
            .await;

        assert!(results.is_empty());
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_throttle_never_exceeds_rate_in_one_second() {
        let rate = 5;
        let throttle = RequestThrottle::per_second(rate);
        assert_eq!(throttle.rate(), rate);

        let start = Instant::now();
        let mut issued = Vec::new();
        for _ in 0..(2 * rate + 1) {
            throttle.acquire().await;
            issued.push(start.elapsed());
        }

        // Small slack for timer granularity.
        let window = Duration::from_millis(980);
        let in_first_second = issued.iter().filter(|t| **t < window).count();
        assert!(
            in_first_second <= rate as usize,
            "{} attempts in the first second: {:?}",
            in_first_second,
            issued
        );

        // Sliding windows: attempt i and attempt i + rate are a full second apart.
        for pair in issued.windows(rate as usize + 1) {
            assert!(pair[rate as usize] - pair[0] >= window, "{:?}", issued);
        }
    }

    #[tokio::test]
    async fn test_throttle_spaces_attempts_evenly() {
        let throttle = RequestThrottle::per_second(10);

        let start = Instant::now();
        throttle.acquire().await;
        // The first attempt from idle is immediate.
        assert!(start.elapsed() < Duration::from_millis(50));

        throttle.acquire().await;
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        assert_eq!(RequestThrottle::per_second(0).rate(), 1);
    }
}
