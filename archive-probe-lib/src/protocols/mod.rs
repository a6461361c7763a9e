//! Protocol implementations for archive probing.
//!
//! This module contains the single-URL HTTP prober and the HTTPS-then-HTTP
//! resolution protocol built on top of it.

/// Single-URL existence checks over HTTP(S)
pub mod http;

/// Candidate URL ordering and short-circuit resolution
pub mod resolver;

// Re-export commonly used functions and types
pub use http::{HttpProber, RateLimitedProber, UrlProber};
pub use resolver::{candidate_urls, resolve, ARCHIVE_PATH};
