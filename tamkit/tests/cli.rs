//! Integration tests for the CLI commands

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn help_lists_the_workflows() {
    let mut cmd = cargo_bin_cmd!("tamkit");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("interactive"))
        .stdout(predicate::str::contains("track"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn validate_missing_model_reports_json_and_fails() {
    let mut cmd = cargo_bin_cmd!("tamkit");
    cmd.args(["validate", "/nonexistent/model.onnx", "--json"]);

    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("\"valid\": false"))
        .stdout(predicate::str::contains("Model file not found"));
}

#[test]
fn validate_missing_model_prints_summary() {
    let mut cmd = cargo_bin_cmd!("tamkit");
    cmd.args(["validate", "/nonexistent/model.onnx"]);

    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("VALIDATION SUMMARY"))
        .stdout(predicate::str::contains("FAILED"));
}

#[test]
fn unknown_device_is_rejected() {
    let mut cmd = cargo_bin_cmd!("tamkit");
    cmd.args([
        "batch",
        "--images-dir",
        "imgs",
        "--boxes-file",
        "boxes.json",
        "--output-dir",
        "out",
        "--device",
        "tpu",
    ]);

    cmd.assert().failure().stderr(predicate::str::contains("tpu"));
}

#[test]
fn malformed_initial_box_is_rejected() {
    let mut cmd = cargo_bin_cmd!("tamkit");
    cmd.args([
        "interactive",
        "--image",
        "a.jpg",
        "--initial-box",
        "10,20,oops,40",
        "--device",
        "cpu",
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("x_min,y_min,x_max,y_max"));
}

#[test]
fn missing_boxes_file_fails_before_loading_models() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("tamkit");
    cmd.arg("batch")
        .arg("--images-dir")
        .arg(dir.path())
        .arg("--boxes-file")
        .arg(dir.path().join("none.json"))
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .args(["--device", "cpu"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot read prompt file"));
}
