//! Archive downloader.
//!
//! Per domain: resolve the working URL, skip if the artifact is already on
//! disk, otherwise stream the body into `<downloads>/<safe>/Archive.zip`. Every
//! attempt is appended to the download log, including resolution failures
//! (with an empty URL).

use crate::concurrent::{ConcurrentProcessor, ProgressHandle, RequestThrottle};
use crate::error::{ArchiveProbeError, ProbeError};
use crate::protocols::http::build_client;
use crate::protocols::{resolve, HttpProber, RateLimitedProber, UrlProber};
use crate::storage::{DownloadLog, Storage};
use crate::types::{DownloadOutcome, DownloadReport, ProbeConfig, ProbeOutcome};
use futures::stream::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Size of the write buffer between the response body and the file.
const WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// Why a fetch did not produce an artifact. Rendered into `DownloadOutcome::Failed`.
#[derive(Debug, Error)]
enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Network(#[from] ProbeError),

    #[error(transparent)]
    Storage(#[from] ArchiveProbeError),
}

fn storage_error(path: &Path, err: std::io::Error) -> FetchError {
    FetchError::Storage(ArchiveProbeError::storage(path.to_string_lossy(), err.to_string()))
}

/// Path the body is streamed to before it is moved into place.
fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Downloads `Archive.zip` from every domain that serves one.
pub struct ArchiveDownloader {
    config: ProbeConfig,
    /// Shared client for downloads; probes go through `prober`
    http_client: reqwest::Client,
    /// Shared with the default prober so probes and downloads draw from one budget
    throttle: Arc<RequestThrottle>,
    prober: Arc<dyn UrlProber>,
    storage: Storage,
    log: DownloadLog,
    processor: ConcurrentProcessor,
}

impl ArchiveDownloader {
    /// Create a downloader writing into `storage`.
    ///
    /// Resolution uses `config.timeout`; the transfer itself uses
    /// `config.download_timeout`.
    pub fn new(config: ProbeConfig, storage: Storage) -> Result<Self, ArchiveProbeError> {
        let http_client = build_client(&config.user_agent)?;
        let throttle = Arc::new(RequestThrottle::per_second(config.effective_rate_limit()));
        let prober = RateLimitedProber::new(
            HttpProber::with_client(http_client.clone(), config.timeout),
            Arc::clone(&throttle),
        );
        let log = DownloadLog::new(storage.download_log_path());
        let processor = ConcurrentProcessor::new(config.workers);

        Ok(Self {
            config,
            http_client,
            throttle,
            prober: Arc::new(prober),
            storage,
            log,
            processor,
        })
    }

    /// Replace the prober used for URL resolution.
    pub fn with_prober(mut self, prober: Arc<dyn UrlProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Stop issuing new domains once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.processor = self.processor.with_cancellation(token);
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn log(&self) -> &DownloadLog {
        &self.log
    }

    pub fn progress(&self) -> ProgressHandle {
        self.processor.progress()
    }

    pub fn is_cancelled(&self) -> bool {
        self.processor.is_cancelled()
    }

    /// Download `url` into the storage location of `domain`.
    ///
    /// Returns `Skipped` without touching the network when the artifact
    /// already exists.
    pub async fn download(&self, domain: &str, url: &str) -> DownloadOutcome {
        let target = self.storage.archive_path(domain);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            info!(domain, path = %target.display(), "archive already present, skipping");
            return DownloadOutcome::already_exists();
        }

        match self.fetch_to(url, &target).await {
            Ok(bytes) => {
                info!(domain, url, bytes, path = %target.display(), "archive downloaded");
                DownloadOutcome::Success
            }
            Err(e) => {
                warn!(domain, url, error = %e, "download failed");
                DownloadOutcome::Failed(e.to_string())
            }
        }
    }

    async fn fetch_to(&self, url: &str, target: &Path) -> Result<u64, FetchError> {
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| storage_error(dir, e))?;
        }

        self.throttle.acquire().await;

        let timeout = self.config.download_timeout;
        let network_error = |e: reqwest::Error| ProbeError::from_reqwest(url, timeout, e);

        let mut response = self
            .http_client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status(status));
        }

        let part = partial_path(target);
        let file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| storage_error(&part, e))?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let mut written: u64 = 0;

        let transfer = async {
            while let Some(chunk) = response.chunk().await.map_err(network_error)? {
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|e| storage_error(&part, e))?;
                written += chunk.len() as u64;
            }
            writer.flush().await.map_err(|e| storage_error(&part, e))?;
            Ok::<(), FetchError>(())
        }
        .await;

        drop(writer);

        if let Err(e) = transfer {
            if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                debug!(path = %part.display(), error = %cleanup, "could not remove partial file");
            }
            return Err(e);
        }

        tokio::fs::rename(&part, target)
            .await
            .map_err(|e| storage_error(target, e))?;

        Ok(written)
    }

    /// Resolve, download and log one domain.
    pub async fn process_domain(&self, domain: &str) -> DownloadReport {
        let report = match resolve(self.prober.as_ref(), domain, self.config.method).await {
            ProbeOutcome::Found(url) => {
                let outcome = self.download(domain, &url).await;
                DownloadReport {
                    domain: domain.to_string(),
                    url: Some(url),
                    outcome,
                }
            }
            ProbeOutcome::NotFound(reason) => {
                warn!(domain, reason = %reason, "no working archive URL");
                DownloadReport {
                    domain: domain.to_string(),
                    url: None,
                    outcome: DownloadOutcome::Failed(reason),
                }
            }
        };

        let url = report.url.as_deref().unwrap_or("");
        if let Err(e) = self
            .log
            .append(domain, url, report.outcome.is_success(), report.outcome.error())
            .await
        {
            warn!(domain, error = %e, "could not write download log");
        }

        report
    }

    /// Process every domain and yield reports as they complete.
    pub fn download_stream(
        &self,
        domains: Vec<String>,
    ) -> Pin<Box<dyn Stream<Item = DownloadReport> + Send + '_>> {
        let stream = self
            .processor
            .run_all(domains, move |domain| async move {
                self.process_domain(&domain).await
            })
            .map(|(_, report)| report);

        Box::pin(stream)
    }

    /// Process every domain and collect all reports, in completion order.
    pub async fn download_all(&self, domains: Vec<String>) -> Vec<DownloadReport> {
        self.download_stream(domains).collect().await
    }
}
