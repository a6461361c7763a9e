//! # Archive Probe Library
//!
//! Finds domains that publish an `/Archive.zip` and downloads those archives.
//!
//! Every domain is resolved by trying `https://{domain}/Archive.zip` and then
//! `http://{domain}/Archive.zip`, stopping at the first 200. Domains are processed
//! concurrently under a worker ceiling and a per-second request rate, and results
//! are reported in completion order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use archive_probe_lib::{ArchiveChecker, Aggregator, ProbeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = ArchiveChecker::new(ProbeConfig::default().with_workers(20))?;
//!     let domains = vec!["example.com".to_string(), "example.org".to_string()];
//!
//!     let mut aggregator = Aggregator::new();
//!     for (domain, outcome) in checker.check_domains(domains).await {
//!         aggregator.record_probe(&domain, &outcome);
//!     }
//!
//!     let (stats, found) = aggregator.finish();
//!     println!("{} of {} domains serve an archive", found.len(), stats.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **HTTPS first**: plain HTTP is only tried when HTTPS fails
//! - **Bounded concurrency**: worker ceiling plus a per-second request throttle
//! - **Streaming results**: outcomes are yielded as soon as each domain completes
//! - **Idempotent downloads**: archives already on disk are skipped

// Re-export main public API types and functions
pub use checker::ArchiveChecker;
pub use concurrent::{ConcurrentProcessor, ProgressHandle, RequestThrottle};
pub use config::{
    load_env_config, parse_timeout_string, ConfigManager, DefaultsConfig, EnvConfig, FileConfig,
};
pub use downloader::ArchiveDownloader;
pub use error::{ArchiveProbeError, ProbeError};
pub use protocols::{
    candidate_urls, resolve, HttpProber, RateLimitedProber, UrlProber, ARCHIVE_PATH,
};
pub use report::{host_of, render_results, write_results, Aggregator, ResultRecord};
pub use storage::{parse_domain_list, sanitize_domain, DownloadLog, Storage, ARCHIVE_FILE_NAME};
pub use types::{
    DownloadOutcome, DownloadReport, HttpOutcome, ProbeConfig, ProbeMethod, ProbeOutcome,
    RunStats, DEFAULT_USER_AGENT,
};

// Internal modules - these are not part of the public API
mod checker;
mod concurrent;
mod config;
mod downloader;
mod error;
mod protocols;
mod report;
mod storage;
mod types;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ArchiveProbeError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        user_agent: DEFAULT_USER_AGENT,
    }
}

/// Information about the library build
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    /// User agent sent unless overridden
    pub user_agent: &'static str,
}
