//! Binary-level tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("dao-provision").expect("binary");
    cmd.env_remove("DAO_PROVISION_CONFIG");
    cmd
}

#[test]
fn plan_prints_stage_order() {
    bin()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("collateral").and(predicate::str::contains("degrade")));
}

#[test]
fn deploy_writes_manifest_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("deployment.json");
    bin()
        .args(["--format", "json", "deploy", "--out"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"runId\""));
    assert!(path.exists());
}

#[test]
fn invalid_config_exits_with_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("dao.json");
    std::fs::write(&config, r#"{"economy": {"contribution": {"denominator": 0}}}"#)
        .expect("write config");
    bin()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
