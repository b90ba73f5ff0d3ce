//! Integration tests for the `tandem` binary and its configuration loading

use std::io::Write;
use std::process::Command;
use tandem_cli::{CliConfig, Scenario};
use tandem_core::SchedulerConfig;
use tempfile::NamedTempFile;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(content.as_bytes()).expect("write temp config");
    file
}

fn tandem(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_tandem"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run tandem")
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration files
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_load_config_file() {
    let file = config_file("[scheduler]\nquantum = 3\nevent_space = 5\n");
    let config = CliConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.scheduler, SchedulerConfig::new(3, 5));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CliConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(err.to_string().contains("failed to read config"));
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let file = config_file("[scheduler]\nquantum = \"fast\"\n");
    let err = CliConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("failed to parse config"));
}

#[test]
fn test_file_config_drives_scenario() {
    let file = config_file("[scheduler]\nquantum = 1\nevent_space = 2\n");
    let config = CliConfig::load(Some(file.path()))
        .unwrap()
        .resolve(None, None)
        .unwrap();

    let report = Scenario::PingPong.run(&config).unwrap();
    assert_eq!(report.config, config);
    assert_eq!(report.journal.len(), 6);
    assert_eq!(report.stats.tasks_joined, 2);
}

// ────────────────────────────────────────────────────────────────────────────
// Binary
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_scenarios_lists_every_workload() {
    let output = tandem(&["scenarios"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for scenario in Scenario::ALL {
        assert!(stdout.contains(scenario.name()), "missing {}", scenario.name());
    }
}

#[test]
fn test_run_prints_journal_and_stats() {
    let output = tandem(&["run", "round-robin", "--quantum", "1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("scenario round-robin (quantum 1, events 16)"));
    assert!(stdout.contains("worker B step 0"));
    assert!(stdout.contains("joined 4"));
}

#[test]
fn test_run_flags_override_config_file() {
    let file = config_file("[scheduler]\nquantum = 9\nevent_space = 4\n");
    let path = file.path().to_str().unwrap();

    let output = tandem(&["run", "broadcast", "--config", path, "--quantum", "2"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("scenario broadcast (quantum 2, events 4)"));
    assert!(stdout.contains("signal released 3 waiters"));
}

#[test]
fn test_run_rejects_invalid_quantum() {
    let output = tandem(&["run", "tree", "--quantum", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid scheduler configuration"));
}

#[test]
fn test_run_rejects_unknown_scenario() {
    let output = tandem(&["run", "juggle"]);
    assert!(!output.status.success());
}

#[test]
fn test_run_rejects_small_event_space() {
    let output = tandem(&["run", "ping-pong", "--events", "1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("needs at least 2 events"));
}
