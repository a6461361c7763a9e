//! Error handling for archive probing operations.
//!
//! Two layers of errors exist. [`ProbeError`] describes why a single URL attempt
//! failed; it never escapes the scheduler and ends up as a reason string inside an
//! outcome. [`ArchiveProbeError`] covers run-level failures: unreadable input,
//! storage problems, bad configuration and user interrupts.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single HTTP attempt against one candidate URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The request exceeded the configured timeout
    #[error("timeout after {duration:?}: {url}")]
    Timeout { url: String, duration: Duration },

    /// DNS, TLS, refused or reset connections
    #[error("connection failed for {url}: {message}")]
    Connection { url: String, message: String },

    /// Malformed responses, redirect loops and other request failures
    #[error("protocol error for {url}: {message}")]
    Protocol { url: String, message: String },
}

impl ProbeError {
    /// Classify a reqwest error for the given URL.
    pub fn from_reqwest(url: &str, duration: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                duration,
            }
        } else if err.is_connect() {
            Self::Connection {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Protocol {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// The URL this attempt was made against.
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url, .. } | Self::Connection { url, .. } | Self::Protocol { url, .. } => {
                url
            }
        }
    }
}

/// Main error type for archive probe runs.
#[derive(Debug, Error)]
pub enum ArchiveProbeError {
    /// Domain list file does not exist
    #[error("domain file not found: {path}")]
    DomainFileNotFound { path: String },

    /// Domain list file exists but could not be read
    #[error("failed to read domain file '{path}': {message}")]
    DomainFileUnreadable { path: String, message: String },

    /// Domain list contained nothing but blank lines and comments
    #[error("domain list is empty: {path}")]
    EmptyDomainList { path: String },

    /// A network attempt failed
    #[error("network error: {0}")]
    Network(#[from] ProbeError),

    /// A directory or file could not be created or written
    #[error("storage error at '{path}': {message}")]
    Storage { path: String, message: String },

    /// Invalid settings in config files, environment or arguments
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The run was cancelled by the user
    #[error("interrupted by user")]
    Interrupted,

    /// Generic internal errors that don't fit other categories
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ArchiveProbeError {
    /// Create a new storage error.
    pub fn storage<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error belongs to the input family (missing, unreadable or empty list).
    ///
    /// Input errors abort the run with a message but are not treated as crashes.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::DomainFileNotFound { .. }
                | Self::DomainFileUnreadable { .. }
                | Self::EmptyDomainList { .. }
        )
    }
}
