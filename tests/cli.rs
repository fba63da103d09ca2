//! End-to-end tests of the `k8s-event-watcher` binary

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

const CONFIG: &str = r#"
filters:
  - rules:
      type: "Warning"
      reason: "BackoffLimitExceeded"
    errorRules:
      type: "^W.*"
sinceNow: true
"#;

fn command() -> Command {
    let mut cmd = Command::cargo_bin("k8s-event-watcher").unwrap();
    for name in [
        "K8SEW_CONFIG",
        "K8SEW_SINCE_NOW",
        "K8SEW_LOG_LEVEL",
        "K8SEW_MAX_RETRIES",
        "RUST_LOG",
    ] {
        cmd.env_remove(name);
    }
    cmd
}

#[test]
fn test_check_prints_validated_config() {
    let (_temp_dir, config_path) = common::temp_config_file(CONFIG);

    command()
        .arg("--config")
        .arg(config_path)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("sinceNow: true"))
        .stdout(predicate::str::contains("reason: BackoffLimitExceeded"));
}

#[test]
fn test_check_rejects_invalid_regex() {
    let (_temp_dir, config_path) = common::temp_config_file(
        "filters:\n  - rules:\n      reason: \"[unclosed\"\n",
    );

    command()
        .arg("--config")
        .arg(config_path)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid regex"));
}

#[test]
fn test_check_rejects_missing_config() {
    command()
        .arg("--config")
        .arg("/nonexistent/k8sew.yaml")
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_match_reports_filter_and_error_fields() {
    let (_config_dir, config_path) = common::temp_config_file(CONFIG);
    let (_event_dir, event_path) = common::temp_file("event.json", common::BACKOFF_EVENT);

    let output = command()
        .arg("--config")
        .arg(config_path)
        .arg("match")
        .arg("--event")
        .arg(event_path)
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["matched"], true);
    assert_eq!(report["filterIndex"], 0);
    assert_eq!(
        report["filterDescription"],
        "reason=BackoffLimitExceeded,type=Warning"
    );
    assert_eq!(report["matchResult"]["matchedErrorFields"]["type"], "Warning");
}

#[test]
fn test_match_reports_no_match() {
    let (_config_dir, config_path) =
        common::temp_config_file("filters:\n  - rules:\n      type: \"Normal\"\n");
    let (_event_dir, event_path) = common::temp_file("event.json", common::BACKOFF_EVENT);

    command()
        .arg("--config")
        .arg(config_path)
        .arg("match")
        .arg("--event")
        .arg(event_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"matched\": false"));
}

#[test]
fn test_match_fails_on_unresolvable_path() {
    let (_config_dir, config_path) =
        common::temp_config_file("filters:\n  - rules:\n      metadata.labels.team: \"x\"\n");
    let (_event_dir, event_path) = common::temp_file("event.json", common::BACKOFF_EVENT);

    command()
        .arg("--config")
        .arg(config_path)
        .arg("match")
        .arg("--event")
        .arg(event_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("metadata.labels.team"));
}

#[test]
fn test_watch_dry_run_drains_event_file() {
    let (_config_dir, config_path) =
        common::temp_config_file("filters:\n  - rules:\n      type: \"Warning\"\n");
    let (_event_dir, event_path) = common::temp_file("events.json", common::BACKOFF_EVENT);

    command()
        .arg("--config")
        .arg(config_path)
        .arg("watch")
        .arg("--events")
        .arg(event_path)
        .arg("--dry-run")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stderr(predicate::str::contains("got event (dry run)"));
}

#[test]
fn test_watch_fails_on_missing_events_file() {
    let (_config_dir, config_path) =
        common::temp_config_file("filters:\n  - rules:\n      type: \"Warning\"\n");

    command()
        .arg("--config")
        .arg(config_path)
        .arg("watch")
        .arg("--events")
        .arg("/nonexistent/k8sew/events.json")
        .arg("--dry-run")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open /nonexistent/k8sew/events.json"));
}

#[test]
fn test_watch_fails_on_malformed_stream() {
    let (_config_dir, config_path) =
        common::temp_config_file("filters:\n  - rules:\n      type: \"Warning\"\n");
    let stream = format!("{}\n{{\"reason\": ]", common::BACKOFF_EVENT);
    let (_event_dir, event_path) = common::temp_file("events.json", &stream);

    command()
        .arg("--config")
        .arg(config_path)
        .arg("watch")
        .arg("--events")
        .arg(event_path)
        .arg("--dry-run")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("got event (dry run)"))
        .stderr(predicate::str::contains("malformed event stream"));
}

#[test]
fn test_invalid_env_override_is_warned_about() {
    let (_temp_dir, config_path) = common::temp_config_file(CONFIG);

    command()
        .env("K8SEW_MAX_RETRIES", "abc")
        .arg("--config")
        .arg(config_path)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("maxRetries: 3"))
        .stderr(predicate::str::contains("Invalid value for K8SEW_MAX_RETRIES: abc"));
}

#[test]
fn test_watch_redacts_webhook_headers_in_logs() {
    let config = "filters:\n  - rules:\n      type: \"Warning\"\nwebhooks:\n  - url: \"http://127.0.0.1:9/hook\"\n    headers:\n      Authorization: \"Bearer topsecret\"\n";
    let (_config_dir, config_path) = common::temp_config_file(config);
    let (_event_dir, event_path) = common::temp_file("events.json", "");

    command()
        .arg("--config")
        .arg(config_path)
        .arg("watch")
        .arg("--events")
        .arg(event_path)
        .arg("--dry-run")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stderr(predicate::str::contains("started"))
        .stderr(predicate::str::contains("<redacted>"))
        .stderr(predicate::str::contains("topsecret").not());
}
