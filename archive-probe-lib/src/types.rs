//! Core data types for archive probing.
//!
//! This module defines the outcome types produced per domain, the aggregate
//! run statistics, and the configuration shared by the checker and downloader.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Browser-like user agent; some hosts refuse requests from unknown clients.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Terminal classification of the HTTPS-then-HTTP protocol for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// A candidate answered 200; carries the working URL
    Found(String),
    /// Every candidate failed; carries the reason of the final attempt
    NotFound(String),
}

impl ProbeOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// The working URL, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Found(url) => Some(url),
            Self::NotFound(_) => None,
        }
    }
}

/// Terminal classification of a download attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Success,
    /// The artifact was already on disk; no network call was made
    Skipped(String),
    Failed(String),
}

impl DownloadOutcome {
    /// Reason string for skips caused by an existing artifact.
    pub const ALREADY_EXISTS: &'static str = "already-exists";

    pub fn already_exists() -> Self {
        Self::Skipped(Self::ALREADY_EXISTS.to_string())
    }

    /// Success and Skipped both leave a usable artifact on disk.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Everything known about one domain after the download pipeline finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub domain: String,
    /// The resolved URL, or `None` when resolution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub outcome: DownloadOutcome,
}

/// HTTP method used for a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// Existence check without body transfer
    #[default]
    Head,
    /// Fetch; only the status line and headers are read for probes
    Get,
}

impl std::str::FromStr for ProbeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "get" => Ok(Self::Get),
            other => Err(format!("unknown probe method '{}', use head or get", other)),
        }
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMethod::Head => write!(f, "HEAD"),
            ProbeMethod::Get => write!(f, "GET"),
        }
    }
}

/// Result of a completed HTTP exchange, after redirects were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOutcome {
    pub status: u16,
    /// URL of the final response in the redirect chain
    pub final_url: String,
}

impl HttpOutcome {
    /// A probe succeeds only on a plain 200.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Aggregate statistics of a finished run.
///
/// `succeeded + failed == total` always holds. `skipped` is a subset of
/// `succeeded` (downloads whose artifact already existed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Percentage rounded to one decimal place, 0 when `total` is 0
    pub success_rate: f64,
}

impl RunStats {
    pub fn new(succeeded: usize, failed: usize, skipped: usize) -> Self {
        let total = succeeded + failed;
        let success_rate = if total == 0 {
            0.0
        } else {
            (succeeded as f64 / total as f64 * 1000.0).round() / 10.0
        };

        Self {
            total,
            succeeded,
            failed,
            skipped,
            success_rate,
        }
    }
}

/// Configuration shared by the checker and the downloader.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Maximum number of domains processed concurrently.
    /// Default: 10, Range: 1-100
    pub workers: usize,

    /// Timeout for each existence check.
    /// Default: 10 seconds
    pub timeout: Duration,

    /// Timeout for each archive download.
    /// Default: 30 seconds
    pub download_timeout: Duration,

    /// URL attempts allowed per second. `None` means "same as workers".
    pub rate_limit: Option<u32>,

    /// Method used for existence checks
    pub method: ProbeMethod,

    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(30),
            rate_limit: None,
            method: ProbeMethod::Head,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ProbeConfig {
    /// Set the worker count, capped at 100 to prevent resource exhaustion.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, 100);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.rate_limit = Some(per_second.clamp(1, 100));
        self
    }

    pub fn with_method(mut self, method: ProbeMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Effective per-second issuance rate for URL attempts.
    pub fn effective_rate_limit(&self) -> u32 {
        self.rate_limit
            .unwrap_or_else(|| u32::try_from(self.workers).unwrap_or(u32::MAX))
            .max(1)
    }
}
