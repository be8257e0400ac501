#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output};

const MISSING_PORT: &str = "/dev/senseway-test-missing-port";

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/sensewaycli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn senseway(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_senseway"))
        .arg("--port")
        .arg(MISSING_PORT)
        .arg("--log-level")
        .arg("off")
        .args(args)
        .output()
        .expect("senseway should run")
}

#[test]
fn version_prints_package_version() {
    let output = senseway(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("senseway {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn extended_version_reports_line_rates() {
    let output = senseway(&["version", "--extended"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("default_baud_rate: 115200"));
    assert!(stdout.contains("update_baud_rate: 1000000"));
}

#[test]
fn zero_timeout_is_a_usage_error() {
    let output = senseway(&["--timeout", "0s", "mac", "4"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn measure_rejects_unknown_range_before_opening_port() {
    let output = senseway(&[
        "measure", "4", "--range", "3", "--freq", "800", "--samples", "10",
    ]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("range"));
}

#[test]
fn measure_rejects_unknown_frequency() {
    let output = senseway(&[
        "measure", "4", "--range", "4", "--freq", "1000", "--samples", "10",
    ]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn measure_rejects_zero_samples() {
    let output = senseway(&[
        "measure", "4", "--range", "4", "--freq", "800", "--samples", "0",
    ]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn measure_rejects_too_many_samples() {
    let output = senseway(&[
        "measure", "4", "--range", "4", "--freq", "800", "--samples", "1000000",
    ]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn update_rejects_empty_image() {
    let dir = unique_temp_dir("empty-image");
    let image = dir.join("empty.bin");
    std::fs::write(&image, b"").expect("image should be writable");

    let output = senseway(&[
        "update",
        "4",
        "0A:B1:FF:00:02:9E",
        image.to_str().expect("temp path should be utf-8"),
    ]);
    assert_eq!(output.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn update_rejects_missing_image() {
    let dir = unique_temp_dir("missing-image");
    let image = dir.join("nope.bin");

    let output = senseway(&[
        "update",
        "4",
        "0A:B1:FF:00:02:9E",
        image.to_str().expect("temp path should be utf-8"),
    ]);
    assert_eq!(output.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn update_rejects_malformed_mac() {
    let output = senseway(&["update", "4", "0A:B1:FF", "firmware.bin"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("MAC"));
}

#[test]
fn assign_rejects_malformed_mac() {
    let output = senseway(&["assign", "4", "zz:00:00:00:00:00", "7"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn metric_rejects_unknown_name() {
    let output = senseway(&["metric", "4", "loudness"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn peak_to_peak_is_not_queried_alone() {
    let output = senseway(&["metric", "4", "peak-to-peak"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn missing_port_fails_node_commands() {
    let output = senseway(&["--timeout", "100ms", "device-version", "4"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("open failed"));
}
