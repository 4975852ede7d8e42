//! CLI integration tests for whisker-cli.
//!
//! These tests verify the CLI behavior by running the actual binary
//! and checking outputs, exit codes, and file artifacts.

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a Command for the whisker binary.
fn whisker() -> Command {
    Command::cargo_bin("whisker").unwrap()
}

/// Write a small synthetic photo and return its path.
fn write_photo(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_fn(96, 64, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, 90]))
        .save(&path)
        .unwrap();
    path
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    whisker()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stray cat re-identification"))
        .stdout(predicate::str::contains("signature"))
        .stdout(predicate::str::contains("enroll"))
        .stdout(predicate::str::contains("aggregate"))
        .stdout(predicate::str::contains("match"));
}

#[test]
fn test_version_displays_version() {
    whisker()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("whisker"));
}

#[test]
fn test_help_shows_exit_codes() {
    whisker()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("69"));
}

#[test]
fn test_match_help_shows_options() {
    whisker()
        .args(["match", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--catalog"))
        .stdout(predicate::str::contains("--threshold"))
        .stdout(predicate::str::contains("--max-hamming"))
        .stdout(predicate::str::contains("--event-out"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_unknown_argument_returns_usage_error() {
    // Exit code 64 = EX_USAGE
    whisker().args(["signature", "--bogus"]).assert().code(64);
}

#[test]
fn test_missing_image_returns_input_error() {
    // Exit code 66 = EX_NOINPUT
    whisker()
        .args(["signature", "nonexistent_cat.jpg"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read image"));
}

#[test]
fn test_undecodable_image_returns_data_error() {
    let temp = TempDir::new().unwrap();
    let photo = temp.path().join("cat.jpg");
    fs::write(&photo, b"this is not a jpeg").unwrap();

    // Exit code 65 = EX_DATAERR
    whisker()
        .args(["signature", photo.to_str().unwrap()])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Image decode error"));
}

#[test]
fn test_missing_weights_returns_unavailable() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "cat.png");

    // Exit code 69 = EX_UNAVAILABLE
    whisker()
        .args([
            "signature",
            photo.to_str().unwrap(),
            "--weights",
            "/nonexistent/cat_embedding.onnx",
        ])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("Model unavailable"));
}

#[cfg(not(feature = "onnx"))]
#[test]
fn test_weights_need_onnx_build() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "cat.png");
    let weights = temp.path().join("cat_embedding.onnx");
    fs::write(&weights, b"onnx graph").unwrap();

    whisker()
        .args([
            "signature",
            photo.to_str().unwrap(),
            "--weights",
            weights.to_str().unwrap(),
        ])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("onnx"));
}

#[test]
fn test_invalid_threshold_returns_usage_error() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "cat.png");
    let catalog = temp.path().join("catalog.json");
    fs::write(&catalog, "[]").unwrap();

    whisker()
        .args([
            "match",
            photo.to_str().unwrap(),
            "--catalog",
            catalog.to_str().unwrap(),
            "--threshold",
            "1.5",
            "--max-results",
            "0",
        ])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("threshold"))
        .stderr(predicate::str::contains("max_results"));
}

#[test]
fn test_missing_catalog_returns_input_error() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "cat.png");

    whisker()
        .args(["match", photo.to_str().unwrap(), "--catalog", "missing.json"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read catalog"));
}

#[test]
fn test_malformed_catalog_returns_data_error() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "cat.png");
    let catalog = temp.path().join("catalog.json");
    fs::write(&catalog, "{ not json").unwrap();

    whisker()
        .args(["match", photo.to_str().unwrap(), "--catalog", catalog.to_str().unwrap()])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to parse catalog"));
}

#[test]
fn test_aggregate_unknown_cat_returns_data_error() {
    let temp = TempDir::new().unwrap();
    let catalog = temp.path().join("catalog.json");
    fs::write(&catalog, "[]").unwrap();

    whisker()
        .args(["aggregate", "--catalog", catalog.to_str().unwrap(), "--cat-id", "4"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("No references for cat 4"));
}

// ============================================================================
// Signature Output Tests
// ============================================================================

#[test]
fn test_signature_json_output() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "cat.png");

    let output = whisker()
        .args(["signature", "--json", photo.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["hash_length"], 512);
    assert_eq!(json["dimension"], 512);
    assert_eq!(json["hash_hex"].as_str().unwrap().len(), 128);
    assert!(json["embedding"].is_string());
    assert!(json["model"].as_str().unwrap().contains("projection"));
}

#[test]
fn test_signature_hash_length_override() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "cat.png");

    let output = whisker()
        .args(["signature", "--json", "--hash-length", "64", photo.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["hash_length"], 64);
    assert_eq!(json["hash_hex"].as_str().unwrap().len(), 16);
    assert_eq!(json["dimension"], 512);
}

#[test]
fn test_signature_human_output() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "cat.png");

    whisker()
        .args(["signature", photo.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signature computed"))
        .stdout(predicate::str::contains("512 bits"));
}

#[test]
fn test_quiet_suppresses_output() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "cat.png");

    whisker()
        .args(["--quiet", "signature", photo.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
