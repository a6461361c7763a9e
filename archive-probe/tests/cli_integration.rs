// archive-probe/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command isolated from the user's config files, environment and working directory.
fn archive_probe(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("archive-probe").unwrap();
    cmd.current_dir(workdir)
        .env("HOME", workdir)
        .env("XDG_CONFIG_HOME", workdir)
        .env_remove("RUST_LOG");
    for var in [
        "AP_WORKERS",
        "AP_TIMEOUT",
        "AP_DOWNLOAD_TIMEOUT",
        "AP_RATE_LIMIT",
        "AP_DATA_DIR",
        "AP_OUTPUT",
        "AP_METHOD",
        "AP_CONFIG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper to create a domain list inside the work directory
fn write_domains(workdir: &Path, domains: &[&str]) -> String {
    let file = workdir.join("domains.txt");
    fs::write(&file, domains.join("\n")).expect("Failed to write domain list");
    file.to_string_lossy().to_string()
}

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn archive_server(body: &'static [u8]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/Archive.zip"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Archive.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(&server)
        .await;
    server
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    archive_probe(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("download"));
}

#[test]
fn test_check_help_shows_options() {
    let dir = TempDir::new().unwrap();
    archive_probe(dir.path())
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--workers"))
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--rate-limit"));
}

#[test]
fn test_missing_domain_file_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    archive_probe(dir.path())
        .args(["check", "does-not-exist.txt", "--no-banner"])
        .assert()
        .success()
        .stderr(predicate::str::contains("domain file not found"));

    assert!(!dir
        .path()
        .join("data/results/available_archives.txt")
        .exists());
}

#[test]
fn test_empty_domain_list_is_reported() {
    let dir = TempDir::new().unwrap();
    let list = write_domains(dir.path(), &["# nothing to do", "", "   "]);

    archive_probe(dir.path())
        .args(["download", &list, "--no-banner"])
        .assert()
        .success()
        .stderr(predicate::str::contains("domain list is empty"));

    assert!(!dir.path().join("logs/downloads.log").exists());
}

#[test]
fn test_domain_file_resolved_from_domains_dir() {
    let dir = TempDir::new().unwrap();
    let domains_dir = dir.path().join("data/domains");
    fs::create_dir_all(&domains_dir).unwrap();
    fs::write(domains_dir.join("list.txt"), "# empty\n").unwrap();

    archive_probe(dir.path())
        .args(["check", "list.txt", "--no-banner"])
        .assert()
        .success()
        .stderr(predicate::str::contains("domain list is empty"));
}

#[test]
fn test_invalid_workers_rejected() {
    let dir = TempDir::new().unwrap();
    let list = write_domains(dir.path(), &["example.com"]);

    archive_probe(dir.path())
        .args(["check", &list, "--workers", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Workers must be between 1 and 100"));
}

#[test]
fn test_invalid_config_file_rejected() {
    let dir = TempDir::new().unwrap();
    let list = write_domains(dir.path(), &["example.com"]);
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[defaults]\nworkers = 500\n").unwrap();

    archive_probe(dir.path())
        .args(["check", &list, "--config", &config.to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_check_writes_results_file() {
    let server = archive_server(b"unused").await;
    let live = server.address().to_string();
    let dead = format!("127.0.0.1:{}", closed_port());

    let dir = TempDir::new().unwrap();
    let list = write_domains(dir.path(), &[&live, &dead]);
    let workdir = dir.path().to_path_buf();

    let output = tokio::task::spawn_blocking(move || {
        archive_probe(&workdir)
            .args(["check", &list, "--timeout", "5", "--no-banner"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 found"), "{}", stdout);
    assert!(stdout.contains("50.0% success"), "{}", stdout);

    let results =
        fs::read_to_string(dir.path().join("data/results/available_archives.txt")).unwrap();
    assert!(results.starts_with("# Domains with Archive.zip\n# Total: 1 domain\n# Format: domain - url\n"));
    assert!(results.contains(&format!("{} - http://{}/Archive.zip", live, live)));
    assert!(!results.contains(&dead));
    assert!(dir.path().join("logs/archive_checker.log").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_saves_archive_and_json_summary() {
    let server = archive_server(b"PK\x03\x04zipdata").await;
    let live = server.address().to_string();

    let dir = TempDir::new().unwrap();
    let list = write_domains(dir.path(), &[&live]);
    let workdir = dir.path().to_path_buf();

    let run = move || {
        archive_probe(&workdir)
            .args(["download", &list, "--timeout", "5", "--json"])
            .output()
            .unwrap()
    };

    let first = tokio::task::spawn_blocking(run.clone()).await.unwrap();
    assert!(first.status.success(), "{:?}", first);
    let summary: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    assert_eq!(summary["command"], "download");
    assert_eq!(summary["stats"]["total"], 1);
    assert_eq!(summary["stats"]["succeeded"], 1);
    assert_eq!(summary["stats"]["skipped"], 0);

    let safe_dir = live.replace(':', "_");
    let archive = dir
        .path()
        .join("data/downloads")
        .join(&safe_dir)
        .join("Archive.zip");
    assert_eq!(fs::read(&archive).unwrap(), b"PK\x03\x04zipdata");

    // Second run finds the archive on disk.
    let second = tokio::task::spawn_blocking(run).await.unwrap();
    let summary: serde_json::Value = serde_json::from_slice(&second.stdout).unwrap();
    assert_eq!(summary["stats"]["succeeded"], 1);
    assert_eq!(summary["stats"]["skipped"], 1);

    let log = fs::read_to_string(dir.path().join("logs/downloads.log")).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert!(log.lines().all(|l| l.ends_with("SUCCESS")));
}
