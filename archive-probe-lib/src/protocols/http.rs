//! Single-URL HTTP probes.
//!
//! [`UrlProber`] is the seam between the probe protocol and the network. The
//! production implementation is [`HttpProber`] (reqwest); [`RateLimitedProber`]
//! wraps any prober so each attempt first takes a permit from the shared
//! [`RequestThrottle`].

use crate::concurrent::RequestThrottle;
use crate::error::{ArchiveProbeError, ProbeError};
use crate::types::{HttpOutcome, ProbeConfig, ProbeMethod};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Issues one existence check or fetch against one URL.
#[async_trait]
pub trait UrlProber: Send + Sync {
    /// Probe `url`, following redirects, and report the final status.
    ///
    /// Non-200 statuses are not errors; they come back as an [`HttpOutcome`].
    async fn probe(&self, url: &str, method: ProbeMethod) -> Result<HttpOutcome, ProbeError>;
}

#[async_trait]
impl<P: UrlProber + ?Sized> UrlProber for Arc<P> {
    async fn probe(&self, url: &str, method: ProbeMethod) -> Result<HttpOutcome, ProbeError> {
        (**self).probe(url, method).await
    }
}

/// Build the shared HTTP client used for probes and downloads.
///
/// The client follows redirects with reqwest's default policy (up to 10 hops).
pub(crate) fn build_client(user_agent: &str) -> Result<reqwest::Client, ArchiveProbeError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|e| ArchiveProbeError::internal(format!("Failed to create HTTP client: {}", e)))
}

/// reqwest-backed prober with a per-request timeout.
#[derive(Clone)]
pub struct HttpProber {
    /// HTTP client, shared read-only across all concurrent probes
    http_client: reqwest::Client,
    /// Timeout applied to every probe
    timeout: Duration,
}

impl HttpProber {
    /// Create a prober from the checker configuration.
    pub fn new(config: &ProbeConfig) -> Result<Self, ArchiveProbeError> {
        Ok(Self {
            http_client: build_client(&config.user_agent)?,
            timeout: config.timeout,
        })
    }

    /// Create a prober over an existing client.
    pub fn with_client(http_client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl UrlProber for HttpProber {
    async fn probe(&self, url: &str, method: ProbeMethod) -> Result<HttpOutcome, ProbeError> {
        let request = match method {
            ProbeMethod::Head => self.http_client.head(url),
            ProbeMethod::Get => self.http_client.get(url),
        };

        // Dropping the response without reading the body is enough for GET probes.
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(url, self.timeout, e))?;

        Ok(HttpOutcome {
            status: response.status().as_u16(),
            final_url: response.url().to_string(),
        })
    }
}

/// A prober wrapper that takes a throttle permit before every attempt.
pub struct RateLimitedProber<P> {
    inner: P,
    throttle: Arc<RequestThrottle>,
}

impl<P: UrlProber> RateLimitedProber<P> {
    pub fn new(inner: P, throttle: Arc<RequestThrottle>) -> Self {
        Self { inner, throttle }
    }

    pub fn throttle(&self) -> &Arc<RequestThrottle> {
        &self.throttle
    }
}

#[async_trait]
impl<P: UrlProber> UrlProber for RateLimitedProber<P> {
    async fn probe(&self, url: &str, method: ProbeMethod) -> Result<HttpOutcome, ProbeError> {
        self.throttle.acquire().await;
        self.inner.probe(url, method).await
    }
}
