//! Console display logic for the archive-probe CLI.
//!
//! Banner, run header, per-domain result lines with a progress counter, and
//! final summaries. Uses only the `console` crate.

use archive_probe_lib::{
    ArchiveProbeError, DownloadOutcome, DownloadReport, ProbeOutcome, RunStats,
};
use console::{pad_str, style, Alignment};
use std::path::Path;
use std::time::Duration;

use crate::{Mode, Settings};

const DOMAIN_WIDTH: usize = 30;

// ── Banner and header ───────────────────────────────────────────────────────

/// Print the program banner.
pub fn print_banner(mode: Mode) {
    println!(
        "{} {} {}",
        style("archive-probe").bold(),
        style(format!("v{}", archive_probe_lib::VERSION)).dim(),
        style(format!("· {}", mode.title())).dim(),
    );
    println!();
}

/// Print what is about to run.
pub fn print_header(settings: &Settings, domain_count: usize, domain_file: &Path) {
    println!(
        "{} {} domain{} from {}",
        style("→").cyan(),
        style(domain_count).bold(),
        if domain_count == 1 { "" } else { "s" },
        domain_file.display(),
    );

    let config = &settings.config;
    let timeout = match settings.mode {
        Mode::Check => format!("Timeout: {}s", config.timeout.as_secs()),
        Mode::Download => format!(
            "Timeout: {}s check, {}s download",
            config.timeout.as_secs(),
            config.download_timeout.as_secs()
        ),
    };
    let meta_parts = [
        format!("Workers: {}", config.workers),
        format!("Rate: {}/s", config.effective_rate_limit()),
        timeout,
        format!("Method: {}", config.method),
    ];

    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── Single result lines ─────────────────────────────────────────────────────

fn counter_prefix((current, total): (usize, usize)) -> String {
    format!("{} ", style(format!("[{}/{}]", current, total)).dim())
}

/// Print one checker outcome with a `[n/total]` prefix.
pub fn print_probe_result(domain: &str, outcome: &ProbeOutcome, counter: (usize, usize)) {
    let padded_domain = pad_str(domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
    let prefix = counter_prefix(counter);

    match outcome {
        ProbeOutcome::Found(url) => println!(
            "  {}{}  {}  {}",
            prefix,
            style(&padded_domain).white(),
            style("FOUND").green().bold(),
            style(url).dim(),
        ),
        ProbeOutcome::NotFound(reason) => println!(
            "  {}{}  {}  {}",
            prefix,
            style(&padded_domain).white(),
            style("NOT FOUND").red(),
            style(brief_reason(reason)).dim(),
        ),
    }
}

/// Print one download report with a `[n/total]` prefix.
pub fn print_download_result(report: &DownloadReport, counter: (usize, usize)) {
    let padded_domain = pad_str(&report.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
    let prefix = counter_prefix(counter);

    match &report.outcome {
        DownloadOutcome::Success => println!(
            "  {}{}  {}",
            prefix,
            style(&padded_domain).white(),
            style("DOWNLOADED").green().bold(),
        ),
        DownloadOutcome::Skipped(_) => println!(
            "  {}{}  {}  {}",
            prefix,
            style(&padded_domain).white(),
            style("SKIPPED").cyan(),
            style("(already downloaded)").dim(),
        ),
        DownloadOutcome::Failed(reason) => println!(
            "  {}{}  {}  {}",
            prefix,
            style(&padded_domain).white(),
            style("FAILED").red(),
            style(brief_reason(reason)).dim(),
        ),
    }
}

// ── Summaries ───────────────────────────────────────────────────────────────

fn print_rule() {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
}

/// Final summary of a check run.
pub fn print_check_summary(stats: &RunStats, results_path: &Path, duration: Duration) {
    println!();
    print_rule();
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(stats.total).bold(),
        if stats.total == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} found", stats.succeeded)).green(),
        style("|").dim(),
        style(format!("{} not found", stats.failed)).red(),
        style("|").dim(),
        style(format!("{:.1}% success", stats.success_rate)).bold(),
    );
    println!("  {} {}", style("Results saved to").dim(), results_path.display());
}

/// Final summary of a download run.
pub fn print_download_summary(stats: &RunStats, downloads_dir: &Path, duration: Duration) {
    println!();
    print_rule();
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(stats.total).bold(),
        if stats.total == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} succeeded", stats.succeeded)).green(),
        style("|").dim(),
        style(format!("{} failed", stats.failed)).red(),
        style("|").dim(),
        style(format!("{:.1}% success", stats.success_rate)).bold(),
    );
    if stats.skipped > 0 {
        println!(
            "  {}",
            style(format!("{} already downloaded, skipped", stats.skipped)).dim()
        );
    }
    println!("  {} {}", style("Archives saved under").dim(), downloads_dir.display());
}

// ── Messages ────────────────────────────────────────────────────────────────

/// Report a missing, unreadable or empty domain list.
pub fn print_input_error(error: &ArchiveProbeError) {
    eprintln!("{} {}", style("⚠").yellow(), error);
    if matches!(error, ArchiveProbeError::DomainFileNotFound { .. }) {
        eprintln!(
            "  {}",
            style("Pass a path, or put the list under <data-dir>/domains/").dim()
        );
    }
}

/// First Ctrl-C: stop issuing domains, let in-flight ones finish.
pub fn print_stopping() {
    eprintln!();
    eprintln!(
        "{} {}",
        style("✋").yellow(),
        style("Stopping after in-flight domains. Press Ctrl-C again to quit now.").yellow()
    );
}

/// Report a user interrupt.
pub fn print_interrupted() {
    eprintln!();
    eprintln!(
        "{} {}",
        style("✋").yellow(),
        style("Interrupted by user. Results collected so far were kept.").yellow()
    );
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Shorten a failure reason for a result line.
fn brief_reason(reason: &str) -> String {
    let r = reason.to_lowercase();
    if r.starts_with("http ") {
        format!("({})", reason)
    } else if r.contains("timeout") || r.contains("timed out") {
        "(timeout)".to_string()
    } else if r.contains("connection") || r.contains("dns") || r.contains("connect") {
        "(connection error)".to_string()
    } else if r.contains("storage") {
        "(storage error)".to_string()
    } else {
        "(error)".to_string()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
