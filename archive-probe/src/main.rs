//! Archive Probe CLI Application
//!
//! A command-line interface for finding and downloading `/Archive.zip` across a
//! list of domains. This CLI application is a thin layer over archive-probe-lib.

mod ui;

use archive_probe_lib::{
    load_env_config, parse_timeout_string, ConfigManager, DefaultsConfig, EnvConfig,
};
use archive_probe_lib::{write_results, Aggregator, ArchiveChecker, ArchiveDownloader};
use archive_probe_lib::{ArchiveProbeError, ProbeConfig, ProbeMethod, Storage};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::error::Error;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Results file written by `check` unless overridden.
const DEFAULT_OUTPUT: &str = "available_archives.txt";
const DEFAULT_DATA_DIR: &str = "data";

/// Exit status after a Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

/// CLI arguments for archive-probe
#[derive(Parser, Debug)]
#[command(name = "archive-probe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find and download /Archive.zip across a list of domains")]
#[command(
    long_about = "Find and download /Archive.zip across a list of domains.\n\nEvery domain is tried over HTTPS first and plain HTTP second. Domains are processed concurrently under a worker limit and a per-second request rate."
)]
#[command(styles = STYLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check which domains serve /Archive.zip and save the list
    Check(CheckArgs),
    /// Download /Archive.zip from every domain that serves one
    Download(DownloadArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Results file name, written under <data-dir>/results/ [default: available_archives.txt]
    #[arg(short = 'o', long = "output", value_name = "FILE", help_heading = "Output")]
    pub output: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Options shared by both commands.
#[derive(clap::Args, Debug, Clone)]
pub struct CommonArgs {
    /// Domain list: a path, or a file name inside <data-dir>/domains/
    #[arg(value_name = "DOMAIN_FILE")]
    pub domain_file: String,

    /// Max concurrent domains (default: 10, max: 100)
    #[arg(short = 'w', long = "workers", value_name = "N", help_heading = "Performance")]
    pub workers: Option<usize>,

    /// Timeout per request, e.g. "10", "10s", "1m" (default: 10s check, 30s download)
    #[arg(short = 't', long = "timeout", value_name = "DURATION", help_heading = "Performance")]
    pub timeout: Option<String>,

    /// URL attempts started per second (default: same as workers)
    #[arg(long = "rate-limit", value_name = "N", help_heading = "Performance")]
    pub rate_limit: Option<u32>,

    /// Existence check method: head or get
    #[arg(long = "method", value_name = "METHOD", help_heading = "Protocol")]
    pub method: Option<ProbeMethod>,

    /// Root of the domains/results/downloads layout (default: data)
    #[arg(long = "data-dir", value_name = "DIR", help_heading = "Configuration")]
    pub data_dir: Option<String>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Print the final statistics as JSON
    #[arg(short = 'j', long = "json", help_heading = "Output")]
    pub json: bool,

    /// Skip the banner
    #[arg(long = "no-banner", help_heading = "Output")]
    pub no_banner: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Which pipeline a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Check,
    Download,
}

impl Mode {
    fn log_file_name(self) -> &'static str {
        match self {
            Mode::Check => "archive_checker.log",
            Mode::Download => "archive_downloader.log",
        }
    }

    pub(crate) fn title(self) -> &'static str {
        match self {
            Mode::Check => "Archive Checker",
            Mode::Download => "Archive Downloader",
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    pub config: ProbeConfig,
    pub data_dir: PathBuf,
    pub output: String,
}

impl Settings {
    fn defaults(mode: Mode) -> Self {
        Self {
            mode,
            config: ProbeConfig::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            output: DEFAULT_OUTPUT.to_string(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, signal_token).await {
            ui::print_interrupted();
            process::exit(EXIT_INTERRUPTED);
        }
    });

    let result = match cli.command {
        Command::Check(args) => run_check(args, cancel).await,
        Command::Download(args) => run_download(args, cancel).await,
    };

    if let Err(e) = result {
        if matches!(
            e.downcast_ref::<ArchiveProbeError>(),
            Some(ArchiveProbeError::Interrupted)
        ) {
            ui::print_interrupted();
            process::exit(EXIT_INTERRUPTED);
        }
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Turn Ctrl-C presses into cancellation.
///
/// The first signal cancels `token` so no new domains start while in-flight
/// work finishes. Returns `true` on a second signal, meaning quit now.
async fn watch_interrupts<F, Fut>(mut next_signal: F, token: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    token.cancel();
    tracing::warn!("interrupt received, waiting for in-flight domains");
    ui::print_stopping();

    next_signal().await.is_ok()
}

/// Run the checker: resolve every domain and write the results file.
async fn run_check(args: CheckArgs, cancel: CancellationToken) -> Result<(), Box<dyn Error>> {
    let common = &args.common;
    let settings = build_settings(common, Mode::Check, args.output.as_deref())?;
    let storage = Storage::new(&settings.data_dir);

    let Some(domains) = prepare_run(&settings, &storage, common).await? else {
        return Ok(());
    };

    let checker = ArchiveChecker::new(settings.config.clone())?.with_cancellation(cancel);
    let total = domains.len();
    let start = Instant::now();
    let mut aggregator = Aggregator::new();

    {
        let mut stream = checker.check_domains_stream(domains);
        while let Some((domain, outcome)) = stream.next().await {
            aggregator.record_probe(&domain, &outcome);
            if !common.json {
                ui::print_probe_result(&domain, &outcome, (aggregator.processed(), total));
            }
        }
    }

    let interrupted = checker.is_cancelled();
    let results_path = storage.results_path(&settings.output);
    let (stats, records) = aggregator.finish();

    // Partial results are kept on interrupt.
    write_results(&results_path, &records).await?;
    tracing::info!(
        total = stats.total,
        found = stats.succeeded,
        interrupted,
        "check finished"
    );

    if common.json {
        let summary = serde_json::json!({
            "command": "check",
            "stats": stats,
            "results_file": results_path.display().to_string(),
            "found": records,
            "interrupted": interrupted,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        ui::print_check_summary(&stats, &results_path, start.elapsed());
    }

    if interrupted {
        return Err(Box::new(ArchiveProbeError::Interrupted));
    }
    Ok(())
}

/// Run the downloader: resolve every domain and fetch its archive.
async fn run_download(args: DownloadArgs, cancel: CancellationToken) -> Result<(), Box<dyn Error>> {
    let common = &args.common;
    let settings = build_settings(common, Mode::Download, None)?;
    let storage = Storage::new(&settings.data_dir);

    let Some(domains) = prepare_run(&settings, &storage, common).await? else {
        return Ok(());
    };

    let downloader =
        ArchiveDownloader::new(settings.config.clone(), storage.clone())?.with_cancellation(cancel);
    let total = domains.len();
    let start = Instant::now();
    let mut aggregator = Aggregator::new();
    let mut reports = Vec::with_capacity(total);

    {
        let mut stream = downloader.download_stream(domains);
        while let Some(report) = stream.next().await {
            aggregator.record_download(&report);
            if !common.json {
                ui::print_download_result(&report, (aggregator.processed(), total));
            }
            reports.push(report);
        }
    }

    let interrupted = downloader.is_cancelled();
    let stats = aggregator.stats();
    tracing::info!(
        total = stats.total,
        succeeded = stats.succeeded,
        skipped = stats.skipped,
        interrupted,
        "download finished"
    );

    if common.json {
        let summary = serde_json::json!({
            "command": "download",
            "stats": stats,
            "downloads_dir": storage.downloads_dir().display().to_string(),
            "reports": reports,
            "interrupted": interrupted,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        ui::print_download_summary(&stats, &storage.downloads_dir(), start.elapsed());
    }

    if interrupted {
        return Err(Box::new(ArchiveProbeError::Interrupted));
    }
    Ok(())
}

/// Shared start-up: log file, directory layout, banner and domain list.
///
/// Returns `None` when the domain list is missing or empty; that has already
/// been reported to the user and is not an error.
async fn prepare_run(
    settings: &Settings,
    storage: &Storage,
    common: &CommonArgs,
) -> Result<Option<Vec<String>>, Box<dyn Error>> {
    init_logging(
        &storage.logs_dir().join(settings.mode.log_file_name()),
        common.verbose,
    )?;
    storage.ensure_dirs().await?;

    if !common.json && !common.no_banner {
        ui::print_banner(settings.mode);
    }

    let domain_file = storage.resolve_domain_file(&common.domain_file);
    let domains = match storage.load_domains(&domain_file).await {
        Ok(domains) => domains,
        Err(e) if e.is_input_error() => {
            tracing::warn!(error = %e, "nothing to process");
            ui::print_input_error(&e);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        mode = ?settings.mode,
        domains = domains.len(),
        workers = settings.config.workers,
        rate_limit = settings.config.effective_rate_limit(),
        timeout = ?settings.config.timeout,
        "run starting"
    );

    if !common.json {
        ui::print_header(settings, domains.len(), &domain_file);
    }

    Ok(Some(domains))
}

/// Install the file logger. `RUST_LOG` overrides the default level.
fn init_logging(log_file: &Path, verbose: bool) -> Result<(), Box<dyn Error>> {
    if let Some(dir) = log_file.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,archive_probe={0},archive_probe_lib={0}",
            level
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()?;

    Ok(())
}

/// Build the run settings.
///
/// Precedence, highest first: CLI flags, `AP_*` environment, config files,
/// built-in defaults.
fn build_settings(
    common: &CommonArgs,
    mode: Mode,
    output: Option<&str>,
) -> Result<Settings, Box<dyn Error>> {
    let config_manager = ConfigManager::new(common.verbose);
    let env_config = load_env_config(common.verbose);

    // Step 1: config file, explicit (--config, then AP_CONFIG) or discovered
    let explicit = common.config.as_ref().or(env_config.config.as_ref());
    let file_config = match explicit {
        Some(path) => {
            if common.verbose {
                println!("🔧 Using config file: {}", path);
            }
            config_manager
                .load_file(path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?
        }
        None => config_manager.discover_and_load()?,
    };

    // Steps 2 and 3: environment, then CLI
    let settings = merge_file_defaults(Settings::defaults(mode), file_config.defaults);
    let settings = apply_environment_config(settings, &env_config);
    let settings = apply_cli_args(settings, common, output)?;

    Ok(settings)
}

fn timeout_from(value: &str) -> Option<Duration> {
    parse_timeout_string(value)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// Apply `[defaults]` from the config files.
fn merge_file_defaults(mut settings: Settings, defaults: Option<DefaultsConfig>) -> Settings {
    let Some(defaults) = defaults else {
        return settings;
    };

    if let Some(workers) = defaults.workers {
        settings.config = settings.config.with_workers(workers);
    }
    if let Some(timeout) = defaults.timeout.as_deref().and_then(timeout_from) {
        settings.config.timeout = timeout;
    }
    if let Some(timeout) = defaults.download_timeout.as_deref().and_then(timeout_from) {
        settings.config.download_timeout = timeout;
    }
    if let Some(rate) = defaults.rate_limit {
        settings.config = settings.config.with_rate_limit(rate);
    }
    if let Some(method) = defaults.method.as_deref().and_then(|m| m.parse().ok()) {
        settings.config.method = method;
    }
    if let Some(user_agent) = defaults.user_agent {
        settings.config.user_agent = user_agent;
    }
    if let Some(data_dir) = defaults.data_dir {
        settings.data_dir = PathBuf::from(data_dir);
    }
    if let Some(output) = defaults.output {
        settings.output = output;
    }

    settings
}

/// Apply `AP_*` environment variables (already validated).
fn apply_environment_config(mut settings: Settings, env_config: &EnvConfig) -> Settings {
    if let Some(workers) = env_config.workers {
        settings.config = settings.config.with_workers(workers);
    }
    if let Some(timeout) = env_config.timeout.as_deref().and_then(timeout_from) {
        settings.config.timeout = timeout;
    }
    if let Some(timeout) = env_config.download_timeout.as_deref().and_then(timeout_from) {
        settings.config.download_timeout = timeout;
    }
    if let Some(rate) = env_config.rate_limit {
        settings.config = settings.config.with_rate_limit(rate);
    }
    if let Some(method) = env_config.method {
        settings.config.method = method;
    }
    if let Some(data_dir) = &env_config.data_dir {
        settings.data_dir = PathBuf::from(data_dir);
    }
    if let Some(output) = &env_config.output {
        settings.output = output.clone();
    }

    settings
}

/// Apply CLI arguments (highest precedence). Out-of-range values are errors.
///
/// `--timeout` is the probe timeout for `check` and the transfer timeout for
/// `download`.
fn apply_cli_args(
    mut settings: Settings,
    common: &CommonArgs,
    output: Option<&str>,
) -> Result<Settings, String> {
    if let Some(workers) = common.workers {
        if !(1..=100).contains(&workers) {
            return Err("Workers must be between 1 and 100".to_string());
        }
        settings.config = settings.config.with_workers(workers);
    }

    if let Some(rate) = common.rate_limit {
        if !(1..=100).contains(&rate) {
            return Err("Rate limit must be between 1 and 100".to_string());
        }
        settings.config = settings.config.with_rate_limit(rate);
    }

    if let Some(value) = &common.timeout {
        let timeout = timeout_from(value).ok_or_else(|| {
            format!(
                "Invalid timeout '{}'. Use format like '10', '10s', '2m'",
                value
            )
        })?;
        match settings.mode {
            Mode::Check => settings.config.timeout = timeout,
            Mode::Download => settings.config.download_timeout = timeout,
        }
    }

    if let Some(method) = common.method {
        settings.config.method = method;
    }
    if let Some(data_dir) = &common.data_dir {
        settings.data_dir = PathBuf::from(data_dir);
    }
    if let Some(output) = output {
        if output.trim().is_empty() {
            return Err("Output file name cannot be empty".to_string());
        }
        settings.output = output.to_string();
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn check_args(args: &[&str]) -> CheckArgs {
        match parse(args).command {
            Command::Check(args) => args,
            other => panic!("expected check, got {:?}", other),
        }
    }

    fn download_args(args: &[&str]) -> DownloadArgs {
        match parse(args).command {
            Command::Download(args) => args,
            other => panic!("expected download, got {:?}", other),
        }
    }

    #[test]
    fn test_check_defaults() {
        let args = check_args(&["archive-probe", "check", "domains.txt"]);
        let settings = apply_cli_args(Settings::defaults(Mode::Check), &args.common, None).unwrap();

        assert_eq!(args.common.domain_file, "domains.txt");
        assert_eq!(settings.config.workers, 10);
        assert_eq!(settings.config.timeout, Duration::from_secs(10));
        assert_eq!(settings.config.effective_rate_limit(), 10);
        assert_eq!(settings.output, DEFAULT_OUTPUT);
        assert_eq!(settings.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_download_timeout_flag_sets_transfer_timeout() {
        let args = download_args(&["archive-probe", "download", "d.txt", "--timeout", "45"]);
        let settings =
            apply_cli_args(Settings::defaults(Mode::Download), &args.common, None).unwrap();

        assert_eq!(settings.config.download_timeout, Duration::from_secs(45));
        assert_eq!(settings.config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_cli_overrides_env_and_file() {
        let defaults = DefaultsConfig {
            workers: Some(30),
            output: Some("from_file.txt".to_string()),
            timeout: Some("20s".to_string()),
            ..Default::default()
        };
        let env_config = EnvConfig {
            workers: Some(40),
            timeout: Some("15s".to_string()),
            ..Default::default()
        };
        let args = check_args(&["archive-probe", "check", "d.txt", "-w", "5"]);

        let settings = merge_file_defaults(Settings::defaults(Mode::Check), Some(defaults));
        let settings = apply_environment_config(settings, &env_config);
        let settings = apply_cli_args(settings, &args.common, None).unwrap();

        assert_eq!(settings.config.workers, 5); // CLI
        assert_eq!(settings.config.timeout, Duration::from_secs(15)); // env
        assert_eq!(settings.output, "from_file.txt"); // file
    }

    #[test]
    fn test_invalid_cli_values_rejected() {
        let args = check_args(&["archive-probe", "check", "d.txt", "--workers", "0"]);
        assert!(apply_cli_args(Settings::defaults(Mode::Check), &args.common, None).is_err());

        let args = check_args(&["archive-probe", "check", "d.txt", "--timeout", "soon"]);
        assert!(apply_cli_args(Settings::defaults(Mode::Check), &args.common, None).is_err());

        let args = check_args(&["archive-probe", "check", "d.txt", "--rate-limit", "500"]);
        assert!(apply_cli_args(Settings::defaults(Mode::Check), &args.common, None).is_err());
    }

    #[test]
    fn test_method_flag_parses() {
        let args = check_args(&["archive-probe", "check", "d.txt", "--method", "get"]);
        assert_eq!(args.common.method, Some(ProbeMethod::Get));
        assert!(Cli::try_parse_from(["archive-probe", "check", "d.txt", "--method", "post"]).is_err());
    }

    #[test]
    fn test_output_only_on_check() {
        let args = check_args(&["archive-probe", "check", "d.txt", "-o", "mine.txt"]);
        assert_eq!(args.output.as_deref(), Some("mine.txt"));
        assert!(Cli::try_parse_from(["archive-probe", "download", "d.txt", "-o", "x"]).is_err());
    }

    fn signals(
        results: Vec<std::io::Result<()>>,
    ) -> impl FnMut() -> std::future::Ready<std::io::Result<()>> {
        let mut results = std::collections::VecDeque::from(results);
        move || {
            std::future::ready(
                results
                    .pop_front()
                    .unwrap_or_else(|| Err(std::io::Error::other("no more signals"))),
            )
        }
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_quit() {
        let token = CancellationToken::new();
        let quit = watch_interrupts(signals(vec![Ok(()), Ok(())]), token.clone()).await;

        assert!(quit);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let token = CancellationToken::new();
        let quit = watch_interrupts(signals(vec![Ok(())]), token.clone()).await;

        assert!(!quit);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_setup_failure_leaves_run_alone() {
        let token = CancellationToken::new();
        let quit = watch_interrupts(signals(Vec::new()), token.clone()).await;

        assert!(!quit);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_log_file_per_mode() {
        assert_eq!(Mode::Check.log_file_name(), "archive_checker.log");
        assert_eq!(Mode::Download.log_file_name(), "archive_downloader.log");
    }
}
