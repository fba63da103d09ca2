use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    temp_file("config.yaml", contents)
}

#[allow(dead_code)]
pub fn temp_file(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let path = temp_dir.path().join(name);
    fs::write(&path, contents).expect("failed to write file");
    (temp_dir, path)
}

/// A `BackoffLimitExceeded` Job warning as the API server emits it.
#[allow(dead_code)]
pub const BACKOFF_EVENT: &str = r#"{
  "metadata": {
    "name": "job-1.17a2b3c4d5e6f708",
    "namespace": "batch",
    "creationTimestamp": "2024-05-01T10:00:00Z"
  },
  "involvedObject": {
    "kind": "Job",
    "namespace": "batch",
    "name": "job-1"
  },
  "reason": "BackoffLimitExceeded",
  "message": "Job has reached the specified backoff limit",
  "source": {"component": "job-controller"},
  "count": 1,
  "type": "Warning"
}"#;
