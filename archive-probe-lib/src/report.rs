//! Result aggregation and the checker's results file.
//!
//! [`Aggregator`] consumes outcomes in completion order, keeps running counts,
//! and for found archives records a `(domain, url)` pair. [`write_results`]
//! serializes those records:
//!
//! ```text
//! # Domains with Archive.zip
//! # Total: 2 domain
//! # Format: domain - url
//!
//! example.com - https://example.com/Archive.zip
//! other.org - http://other.org/Archive.zip
//! ```

use crate::error::ArchiveProbeError;
use crate::types::{DownloadOutcome, DownloadReport, ProbeOutcome, RunStats};
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use url::Url;

/// A found archive: the host it was found on and the full working URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub domain: String,
    pub url: String,
}

impl ResultRecord {
    /// Build a record from a resolved URL, taking the host from the URL authority.
    ///
    /// `fallback` is used when the URL cannot be parsed or has no host.
    pub fn from_url(url: &str, fallback: &str) -> Self {
        Self {
            domain: host_of(url).unwrap_or_else(|| fallback.to_string()),
            url: url.to_string(),
        }
    }

    /// `domain - url`, as written to the results file.
    pub fn to_line(&self) -> String {
        format!("{} - {}", self.domain, self.url)
    }
}

/// Host (plus explicit non-default port) of `url`. Credentials are never included.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Running tally of outcomes.
#[derive(Debug, Default)]
pub struct Aggregator {
    succeeded: usize,
    failed: usize,
    skipped: usize,
    records: Vec<ResultRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one probe outcome; found archives are also recorded.
    pub fn record_probe(&mut self, domain: &str, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Found(url) => {
                self.succeeded += 1;
                self.records.push(ResultRecord::from_url(url, domain));
            }
            ProbeOutcome::NotFound(_) => self.failed += 1,
        }
    }

    /// Count one download report. Skipped downloads count as succeeded.
    pub fn record_download(&mut self, report: &DownloadReport) {
        if report.outcome.is_success() {
            self.succeeded += 1;
            if matches!(report.outcome, DownloadOutcome::Skipped(_)) {
                self.skipped += 1;
            }
        } else {
            self.failed += 1;
        }
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Records of found archives, in completion order.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn stats(&self) -> RunStats {
        RunStats::new(self.succeeded, self.failed, self.skipped)
    }

    /// Consume the aggregator into final statistics and records.
    pub fn finish(self) -> (RunStats, Vec<ResultRecord>) {
        let stats = self.stats();
        (stats, self.records)
    }
}

/// Render the results file contents.
pub fn render_results(records: &[ResultRecord]) -> String {
    let mut out = String::new();
    out.push_str("# Domains with Archive.zip\n");
    out.push_str(&format!("# Total: {} domain\n", records.len()));
    out.push_str("# Format: domain - url\n\n");
    for record in records {
        out.push_str(&record.to_line());
        out.push('\n');
    }
    out
}

/// Write the results file atomically (temporary file, then rename).
///
/// An interrupted write leaves any previous results file untouched.
pub async fn write_results(path: &Path, records: &[ResultRecord]) -> Result<(), ArchiveProbeError> {
    let storage_err =
        |p: &Path, e: std::io::Error| ArchiveProbeError::storage(p.to_string_lossy(), e.to_string());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_err(parent, e))?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| storage_err(&tmp_path, e))?;
    file.write_all(render_results(records).as_bytes())
        .await
        .map_err(|e| storage_err(&tmp_path, e))?;
    file.sync_all().await.map_err(|e| storage_err(&tmp_path, e))?;
    drop(file);

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| storage_err(path, e))?;

    tracing::info!(path = %path.display(), count = records.len(), "results saved");
    Ok(())
}
