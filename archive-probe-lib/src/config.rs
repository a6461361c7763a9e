//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `AP_*`
//! environment variables, and merging configurations with proper precedence
//! rules.

use crate::error::ArchiveProbeError;
use crate::types::ProbeMethod;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration loaded from TOML files.
///
/// ```toml
/// [defaults]
/// workers = 10
/// timeout = "10s"
/// download_timeout = "30s"
/// rate_limit = 10
/// data_dir = "data"
/// output = "available_archives.txt"
/// method = "head"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// Concurrent domains (1-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Probe timeout (as string, e.g., "5s", "30s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Download timeout (as string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_timeout: Option<String>,

    /// URL attempts per second (1-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,

    /// Root of the domains/results/downloads layout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Results file name for the checker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Existence-check method, "head" or "get"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl DefaultsConfig {
    /// Overlay `higher` onto `self`; fields set in `higher` win.
    fn merge(mut self, higher: DefaultsConfig) -> DefaultsConfig {
        if higher.workers.is_some() {
            self.workers = higher.workers;
        }
        if higher.timeout.is_some() {
            self.timeout = higher.timeout;
        }
        if higher.download_timeout.is_some() {
            self.download_timeout = higher.download_timeout;
        }
        if higher.rate_limit.is_some() {
            self.rate_limit = higher.rate_limit;
        }
        if higher.data_dir.is_some() {
            self.data_dir = higher.data_dir;
        }
        if higher.output.is_some() {
            self.output = higher.output;
        }
        if higher.user_agent.is_some() {
            self.user_agent = higher.user_agent;
        }
        if higher.method.is_some() {
            self.method = higher.method;
        }
        self
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to emit warnings for config issues
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveProbeError::Config` if the file is missing, unreadable,
    /// not valid TOML, or holds out-of-range values.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ArchiveProbeError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ArchiveProbeError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ArchiveProbeError::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            ArchiveProbeError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config, then `~/.archive-probe.toml`, then the local file; later
    /// files win per field. Files that fail to load are skipped.
    pub fn discover_and_load(&self) -> Result<FileConfig, ArchiveProbeError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => {
                    if self.verbose {
                        eprintln!("⚠️  Ignoring {}: {}", path.display(), e);
                    }
                }
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            eprintln!("⚠️  Multiple config files found. Later files override earlier ones:");
            for path in &loaded_files {
                eprintln!("   {}", path.display());
            }
        }

        Ok(merged_config)
    }

    /// Get the local configuration file path.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./archive-probe.toml", "./.archive-probe.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Get the global configuration file path.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".archive-probe.toml", "archive-probe.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Get the XDG configuration file path.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("archive-probe").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations; values from `higher` take precedence.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower_defaults), Some(higher_defaults)) => {
                    Some(lower_defaults.merge(higher_defaults))
                }
                (None, higher_defaults) => higher_defaults,
                (lower_defaults, None) => lower_defaults,
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), ArchiveProbeError> {
        let Some(defaults) = &config.defaults else {
            return Ok(());
        };

        if let Some(workers) = defaults.workers {
            if !(1..=100).contains(&workers) {
                return Err(ArchiveProbeError::config(
                    "workers must be between 1 and 100",
                ));
            }
        }

        if let Some(rate_limit) = defaults.rate_limit {
            if !(1..=100).contains(&rate_limit) {
                return Err(ArchiveProbeError::config(
                    "rate_limit must be between 1 and 100",
                ));
            }
        }

        for (key, value) in [
            ("timeout", &defaults.timeout),
            ("download_timeout", &defaults.download_timeout),
        ] {
            if let Some(value) = value {
                if !matches!(parse_timeout_string(value), Some(secs) if secs > 0) {
                    return Err(ArchiveProbeError::config(format!(
                        "Invalid {} '{}'. Use format like '5s', '30s', '2m'",
                        key, value
                    )));
                }
            }
        }

        if let Some(method) = &defaults.method {
            method
                .parse::<ProbeMethod>()
                .map_err(ArchiveProbeError::config)?;
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via AP_* environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub workers: Option<usize>,
    pub timeout: Option<String>,
    pub download_timeout: Option<String>,
    pub rate_limit: Option<u32>,
    pub data_dir: Option<String>,
    pub output: Option<String>,
    pub method: Option<ProbeMethod>,
    pub config: Option<String>,
}

/// Load configuration from environment variables.
///
/// Invalid values are ignored; with `verbose` they are reported on stderr.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    load_env_config_from(verbose, |key| env::var(key).ok())
}

fn load_env_config_from<F>(verbose: bool, lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    let report = |key: &str, value: &str| {
        if verbose {
            println!("🔧 Using {}={}", key, value);
        }
    };
    let reject = |key: &str, value: &str, hint: &str| {
        if verbose {
            eprintln!("⚠️ Invalid {}='{}', {}", key, value, hint);
        }
    };

    if let Some(val) = lookup("AP_WORKERS") {
        match val.trim().parse::<usize>() {
            Ok(workers) if (1..=100).contains(&workers) => {
                env_config.workers = Some(workers);
                report("AP_WORKERS", &val);
            }
            _ => reject("AP_WORKERS", &val, "must be 1-100"),
        }
    }

    if let Some(val) = lookup("AP_RATE_LIMIT") {
        match val.trim().parse::<u32>() {
            Ok(rate) if (1..=100).contains(&rate) => {
                env_config.rate_limit = Some(rate);
                report("AP_RATE_LIMIT", &val);
            }
            _ => reject("AP_RATE_LIMIT", &val, "must be 1-100"),
        }
    }

    for (key, slot) in [
        ("AP_TIMEOUT", &mut env_config.timeout),
        ("AP_DOWNLOAD_TIMEOUT", &mut env_config.download_timeout),
    ] {
        if let Some(val) = lookup(key) {
            if matches!(parse_timeout_string(&val), Some(secs) if secs > 0) {
                report(key, &val);
                *slot = Some(val);
            } else {
                reject(key, &val, "use format like '5s', '30s', '2m'");
            }
        }
    }

    if let Some(val) = lookup("AP_METHOD") {
        match val.parse::<ProbeMethod>() {
            Ok(method) => {
                env_config.method = Some(method);
                report("AP_METHOD", &val);
            }
            Err(_) => reject("AP_METHOD", &val, "use head or get"),
        }
    }

    for (key, slot) in [
        ("AP_DATA_DIR", &mut env_config.data_dir),
        ("AP_OUTPUT", &mut env_config.output),
        ("AP_CONFIG", &mut env_config.config),
    ] {
        if let Some(val) = lookup(key) {
            if !val.trim().is_empty() {
                report(key, &val);
                *slot = Some(val);
            }
        }
    }

    env_config
}

/// Parse a timeout string like "5s", "30s", "2m" into seconds.
///
/// A bare number is taken as seconds. Returns `None` if parsing fails.
pub fn parse_timeout_string(timeout_str: &str) -> Option<u64> {
    let timeout_str = timeout_str.trim().to_lowercase();

    if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>().ok().and_then(|m| m.checked_mul(60))
    } else {
        timeout_str.parse::<u64>().ok()
    }
}
