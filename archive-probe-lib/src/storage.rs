//! On-disk layout: domain lists, results, downloads and the download log.
//!
//! ```text
//! <base>/domains/           input lists, one domain per line
//! <base>/results/           checker output files
//! <base>/downloads/<safe>/  one directory per domain, holding Archive.zip
//! logs/                     log files
//! ```

use crate::error::ArchiveProbeError;
use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// File name of every downloaded artifact.
pub const ARCHIVE_FILE_NAME: &str = "Archive.zip";

/// Characters that are not allowed in directory names on common filesystems.
const INVALID_PATH_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Turn a domain into a filesystem-safe directory name.
///
/// Each of `< > : " / \ | ? *` becomes `_`, and a leading `.` gets a `_` prefix
/// so the directory is never hidden.
pub fn sanitize_domain(domain: &str) -> String {
    let safe: String = domain
        .chars()
        .map(|c| if INVALID_PATH_CHARS.contains(&c) { '_' } else { c })
        .collect();

    if safe.starts_with('.') {
        format!("_{}", safe)
    } else {
        safe
    }
}

/// Parse a domain list: one entry per line, blank lines and `#` comments skipped.
pub fn parse_domain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Directory layout rooted at a data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    base_dir: PathBuf,
    logs_dir: PathBuf,
}

impl Storage {
    /// Create a layout rooted at `base_dir`, with logs in `./logs`.
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
            logs_dir: PathBuf::from("logs"),
        }
    }

    pub fn with_logs_dir<P: Into<PathBuf>>(mut self, logs_dir: P) -> Self {
        self.logs_dir = logs_dir.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn domains_dir(&self) -> PathBuf {
        self.base_dir.join("domains")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.base_dir.join("results")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.base_dir.join("downloads")
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Create every directory of the layout.
    pub async fn ensure_dirs(&self) -> Result<(), ArchiveProbeError> {
        for dir in [
            self.domains_dir(),
            self.results_dir(),
            self.downloads_dir(),
            self.logs_dir.clone(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| ArchiveProbeError::storage(dir.to_string_lossy(), e.to_string()))?;
            debug!(dir = %dir.display(), "directory ready");
        }
        Ok(())
    }

    /// Locate a domain list: the name as given if it exists, else under `domains/`.
    pub fn resolve_domain_file(&self, name: &str) -> PathBuf {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            direct
        } else {
            self.domains_dir().join(name)
        }
    }

    /// Read a domain list file.
    ///
    /// # Errors
    ///
    /// - `DomainFileNotFound` if the file does not exist
    /// - `DomainFileUnreadable` if it cannot be read as UTF-8 text
    /// - `EmptyDomainList` if only blank lines and comments remain
    pub async fn load_domains(&self, path: &Path) -> Result<Vec<String>, ArchiveProbeError> {
        let path_str = path.to_string_lossy().to_string();

        if !path.exists() {
            return Err(ArchiveProbeError::DomainFileNotFound { path: path_str });
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ArchiveProbeError::DomainFileUnreadable {
                path: path_str.clone(),
                message: e.to_string(),
            }
        })?;

        let domains = parse_domain_list(&content);
        if domains.is_empty() {
            return Err(ArchiveProbeError::EmptyDomainList { path: path_str });
        }

        info!(count = domains.len(), file = %path_str, "domain list loaded");
        Ok(domains)
    }

    /// Download directory for `domain` (not created).
    pub fn domain_dir(&self, domain: &str) -> PathBuf {
        self.downloads_dir().join(sanitize_domain(domain))
    }

    /// Where the archive of `domain` is stored.
    pub fn archive_path(&self, domain: &str) -> PathBuf {
        self.domain_dir(domain).join(ARCHIVE_FILE_NAME)
    }

    /// Path of a results file inside `results/`.
    pub fn results_path(&self, file_name: &str) -> PathBuf {
        self.results_dir().join(file_name)
    }

    pub fn download_log_path(&self) -> PathBuf {
        self.logs_dir.join("downloads.log")
    }
}

/// Append-only log with one line per domain attempt.
///
/// Lines look like
/// `[2026-10-19T10:00:00Z] example.com - https://example.com/Archive.zip - SUCCESS`
/// with ` - Error: <text>` appended on failures. Writers are serialized so lines
/// never interleave.
#[derive(Debug)]
pub struct DownloadLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DownloadLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format one log line (newline included) stamped with the current UTC time.
    pub fn format_entry(domain: &str, url: &str, success: bool, error: Option<&str>) -> String {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let status = if success { "SUCCESS" } else { "FAILURE" };
        let error = error.map(|e| format!(" - Error: {}", e)).unwrap_or_default();
        format!("[{}] {} - {} - {}{}\n", timestamp, domain, url, status, error)
    }

    /// Append one entry.
    pub async fn append(
        &self,
        domain: &str,
        url: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<(), ArchiveProbeError> {
        let entry = Self::format_entry(domain, url, success, error);
        let storage_err =
            |e: std::io::Error| ArchiveProbeError::storage(self.path.to_string_lossy(), e.to_string());

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(storage_err)?;
        file.write_all(entry.as_bytes()).await.map_err(storage_err)?;
        file.flush().await.map_err(storage_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize_domain("example.com"), "example.com");
        assert_eq!(sanitize_domain("host:8080"), "host_8080");
        assert_eq!(sanitize_domain(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_sanitize_never_starts_with_dot() {
        assert_eq!(sanitize_domain(".hidden"), "_.hidden");
        assert_eq!(sanitize_domain("..."), "_...");
        assert_eq!(sanitize_domain(""), "");
    }

    #[test]
    fn test_sanitize_arbitrary_inputs() {
        let inputs = [
            "normal.org",
            ".dotfirst.net",
            "/etc/passwd",
            "\\\\server\\share",
            "user:pass@host",
            "??**||",
            "\"quoted\"",
            ".:/.",
            "ünïcödé.example",
        ];
        for input in inputs {
            let safe = sanitize_domain(input);
            assert!(
                !safe.contains(INVALID_PATH_CHARS),
                "{:?} -> {:?} still has invalid chars",
                input,
                safe
            );
            assert!(!safe.starts_with('.'), "{:?} -> {:?} starts with '.'", input, safe);
        }
    }

    #[test]
    fn test_parse_domain_list_skips_blanks_and_comments() {
        let content = "# header\nexample.com\n\n   \n  spaced.org  \n#commented.net\nlast.io";
        assert_eq!(
            parse_domain_list(content),
            vec!["example.com", "spaced.org", "last.io"]
        );
    }

    #[tokio::test]
    async fn test_load_domains_missing_file() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        let err = storage
            .load_domains(&dir.path().join("nope.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveProbeError::DomainFileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_domains_reads_list() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("list.txt");
        std::fs::write(&file, "# header\na.com\n\n  b.org  \n").unwrap();

        let domains = Storage::new(dir.path()).load_domains(&file).await.unwrap();
        assert_eq!(domains, vec!["a.com", "b.org"]);
    }

    #[tokio::test]
    async fn test_load_domains_only_comments_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("list.txt");
        std::fs::write(&file, "# nothing here\n\n# still nothing\n").unwrap();

        let err = Storage::new(dir.path()).load_domains(&file).await.unwrap_err();
        assert!(matches!(err, ArchiveProbeError::EmptyDomainList { .. }));
    }

    #[tokio::test]
    async fn test_resolve_domain_file_falls_back_to_domains_dir() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        std::fs::create_dir_all(storage.domains_dir()).unwrap();
        std::fs::write(storage.domains_dir().join("list.txt"), "a.com\n").unwrap();

        let resolved = storage.resolve_domain_file("list.txt");
        assert_eq!(resolved, storage.domains_dir().join("list.txt"));
        assert_eq!(storage.load_domains(&resolved).await.unwrap(), vec!["a.com"]);
    }

    #[tokio::test]
    async fn test_ensure_dirs_creates_layout() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("data")).with_logs_dir(dir.path().join("logs"));
        storage.ensure_dirs().await.unwrap();

        assert!(storage.domains_dir().is_dir());
        assert!(storage.results_dir().is_dir());
        assert!(storage.downloads_dir().is_dir());
        assert!(storage.logs_dir().is_dir());
    }

    #[test]
    fn test_archive_path_uses_sanitized_dir() {
        let storage = Storage::new("data");
        assert_eq!(
            storage.archive_path("host:8080"),
            PathBuf::from("data/downloads/host_8080/Archive.zip")
        );
    }

    #[test]
    fn test_log_entry_format() {
        let ok = DownloadLog::format_entry("a.com", "https://a.com/Archive.zip", true, None);
        assert!(ok.starts_with('['));
        assert!(ok.ends_with("] a.com - https://a.com/Archive.zip - SUCCESS\n"));

        let failed = DownloadLog::format_entry("b.com", "", false, Some("HTTP 404"));
        assert!(failed.ends_with("] b.com -  - FAILURE - Error: HTTP 404\n"));
    }

    #[tokio::test]
    async fn test_concurrent_appends_produce_whole_lines() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(DownloadLog::new(dir.path().join("logs").join("downloads.log")));

        let mut handles = Vec::new();
        for i in 0..20 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                let domain = format!("d{}.test", i);
                log.append(&domain, "http://x/Archive.zip", i % 2 == 0, None)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 20);
        assert!(lines
            .iter()
            .all(|l| l.ends_with("SUCCESS") || l.ends_with("FAILURE")));
    }
}
