//! §6: argument-parsing specs for the `trellisd` binary itself, driven
//! end-to-end through the compiled executable rather than library calls.

use assert_cmd::Command;

fn stderr_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

#[test]
fn missing_config_flag_prints_usage_and_fails() {
    let assert = Command::cargo_bin("trellisd").expect("find trellisd binary").assert().failure();
    assert!(stderr_of(&assert).contains("usage: trellisd --config"));
}

#[test]
fn unrecognized_flag_prints_usage_and_fails() {
    let assert = Command::cargo_bin("trellisd").expect("find trellisd binary").arg("--bogus").assert().failure();
    assert!(stderr_of(&assert).contains("usage: trellisd --config"));
}

#[test]
fn job_store_with_no_persisted_scheduler_config_fails_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store_root = dir.path().join("store");
    let config_path = dir.path().join("trellis.toml");
    std::fs::write(&config_path, format!("job_store_root = {:?}\n", store_root)).expect("write config");

    // No scheduler `Config` shared file has ever been written into
    // `store_root` (that only happens once a leader run has persisted
    // one) — the daemon must exit nonzero rather than panic.
    Command::cargo_bin("trellisd")
        .expect("find trellisd binary")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure();
}
