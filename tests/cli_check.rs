use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;

fn taskdriver(workdir: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("taskdriver"));
    cmd.current_dir(workdir)
        .env_remove("RUST_LOG")
        .args(["--config", "absent.yaml"]);
    cmd
}

#[test]
fn check_prints_the_parsed_script() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("login.txt"),
        r#"[
    ('get', 'https://example.com/login'),  # landing page
    ("send_keys", "//input[@name='user']", "ada"),
    ("send_keys", "//input[@name='user']", "enter"),
    ("sleep", "1.5"),
]"#,
    )
    .unwrap();

    let assert = taskdriver(dir.path())
        .args(["check", "login.txt"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains(r#"("get", "https://example.com/login")"#), "{stdout}");
    assert!(stdout.contains(r#"("send_keys", "//input[@name='user']", "enter")"#), "{stdout}");
    assert!(stdout.contains(r#"("sleep", 1.5)"#), "{stdout}");
}

#[test]
fn check_accepts_structured_scripts() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("loop.yaml"),
        "- [for, \"a, b\", \"[('send_keys', '//input', 'element')]\"]\n- [refresh]\n",
    )
    .unwrap();

    taskdriver(dir.path())
        .args(["check", "loop.yaml"])
        .assert()
        .success();
}

#[test]
fn check_fails_on_unknown_commands() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("typo.json"),
        r#"[["get", "https://example.com"], ["clik", "//button"]]"#,
    )
    .unwrap();

    let assert = taskdriver(dir.path())
        .args(["check", "typo.json"])
        .assert()
        .failure();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("unknown command: clik"), "{stderr}");
}

#[test]
fn check_rejects_malformed_instructions() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.txt"), r#"[("get",)]"#).unwrap();

    taskdriver(dir.path())
        .args(["check", "bad.txt"])
        .assert()
        .failure();
}

#[test]
fn local_env_problems_reach_the_log() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config/local.env"),
        "# overrides\nTASKDRIVER_CLI_TEST_MARKER=1\nnot a pair\n",
    )
    .unwrap();
    fs::write(dir.path().join("noop.txt"), r#"[("refresh",)]"#).unwrap();

    let assert = taskdriver(dir.path())
        .args(["--log-level", "info", "check", "noop.txt"])
        .assert()
        .success();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("invalid local.env entry"), "{stderr}");
    assert!(stderr.contains("Loaded environment overrides from local.env"), "{stderr}");
}
