//! Archive checker: the HTTPS-then-HTTP protocol run across a domain list.
//!
//! This module provides the `ArchiveChecker` struct that ties the rate-limited
//! prober to the concurrent scheduler.

use crate::concurrent::{ConcurrentProcessor, ProgressHandle, RequestThrottle};
use crate::error::ArchiveProbeError;
use crate::protocols::{resolve, HttpProber, RateLimitedProber, UrlProber};
use crate::types::{ProbeConfig, ProbeOutcome};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Checks which domains serve `/Archive.zip`.
///
/// One checker owns one HTTP client for its whole lifetime; dropping the
/// checker releases it.
///
/// # Example
///
/// ```rust,no_run
/// use archive_probe_lib::{ArchiveChecker, ProbeConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = ArchiveChecker::new(ProbeConfig::default())?;
///     let outcome = checker.check_domain("example.com").await;
///     println!("{:?}", outcome);
///     Ok(())
/// }
/// ```
pub struct ArchiveChecker {
    /// Configuration settings for this checker instance
    config: ProbeConfig,
    /// Prober used for every candidate URL
    prober: Arc<dyn UrlProber>,
    /// Scheduler bounding in-flight domains
    processor: ConcurrentProcessor,
}

impl ArchiveChecker {
    /// Create a checker with a reqwest prober throttled to the configured rate.
    pub fn new(config: ProbeConfig) -> Result<Self, ArchiveProbeError> {
        let throttle = Arc::new(RequestThrottle::per_second(config.effective_rate_limit()));
        let prober = RateLimitedProber::new(HttpProber::new(&config)?, throttle);
        Ok(Self::with_prober(config, Arc::new(prober)))
    }

    /// Create a checker over any prober.
    pub fn with_prober(config: ProbeConfig, prober: Arc<dyn UrlProber>) -> Self {
        let processor = ConcurrentProcessor::new(config.workers);
        Self {
            config,
            prober,
            processor,
        }
    }

    /// Stop issuing new domains once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.processor = self.processor.with_cancellation(token);
        self
    }

    /// Resolve a single domain.
    pub async fn check_domain(&self, domain: &str) -> ProbeOutcome {
        resolve(self.prober.as_ref(), domain, self.config.method).await
    }

    /// Check every domain and return all outcomes, in completion order.
    pub async fn check_domains(&self, domains: Vec<String>) -> Vec<(String, ProbeOutcome)> {
        self.check_domains_stream(domains).collect().await
    }

    /// Check domains and yield `(domain, outcome)` pairs as they complete.
    ///
    /// At most `config.workers` domains are in flight at once.
    pub fn check_domains_stream(
        &self,
        domains: Vec<String>,
    ) -> Pin<Box<dyn Stream<Item = (String, ProbeOutcome)> + Send + '_>> {
        self.processor
            .run_all(domains, move |domain| async move {
                self.check_domain(&domain).await
            })
    }

    /// Live count of completed domains.
    pub fn progress(&self) -> ProgressHandle {
        self.processor.progress()
    }

    pub fn is_cancelled(&self) -> bool {
        self.processor.is_cancelled()
    }

    /// Get the current configuration for this checker.
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }
}
