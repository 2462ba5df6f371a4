//! End-to-end tests of the `capsh` binary in one-line (`-c`) mode.
//!
//! Standard output is a pipe here, so captured output is always printed
//! directly and the pager never starts.

use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

fn capsh_cmd(base: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("capsh"));
    cmd.arg("--base-dir").arg(base).current_dir(base);
    cmd
}

fn install(base: &Path, dir: &str, name: &str, script: &str) {
    let dir = base.join(dir);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

// =============================================================================
// Resolution and argv
// =============================================================================

#[test]
fn test_runs_installed_command() {
    let base = TempDir::new().unwrap();
    install(base.path(), "bin", "calc", "echo 4");

    capsh_cmd(base.path())
        .args(["-c", "calc 2+2"])
        .assert()
        .success()
        .stdout("4\n");
}

#[test]
fn test_flags_are_passed_before_parameters() {
    let base = TempDir::new().unwrap();
    install(base.path(), "commands", "args", r#"printf '[%s]' "$@""#);

    capsh_cmd(base.path())
        .args(["-c", r#"args report.txt -o out.txt "two words" --level 3"#])
        .assert()
        .success()
        .stdout("[-o][out.txt][--level][3][report.txt][two words]");
}

#[test]
fn test_base_dir_is_exported() {
    let base = TempDir::new().unwrap();
    install(base.path(), "bin", "home", r#"echo "$CAPSH_HOME""#);
    let canonical = base.path().canonicalize().unwrap();

    capsh_cmd(base.path())
        .args(["-c", "home"])
        .assert()
        .success()
        .stdout(format!("{}\n", canonical.display()));
}

#[test]
fn test_unknown_name_runs_through_system_shell() {
    let base = TempDir::new().unwrap();

    capsh_cmd(base.path())
        .args(["-c", "echo from the system; exit 6"])
        .assert()
        .code(6)
        .stdout("from the system\n");
}

// =============================================================================
// Capture
// =============================================================================

#[test]
fn test_stdout_and_stderr_are_captured_together() {
    let base = TempDir::new().unwrap();
    install(base.path(), "bin", "noisy", "echo out; echo err >&2; echo more");

    capsh_cmd(base.path())
        .args(["-c", "noisy"])
        .assert()
        .success()
        .stdout("out\nerr\nmore\n")
        .stderr("");
}

#[test]
fn test_failed_command_keeps_output_and_status() {
    let base = TempDir::new().unwrap();
    install(base.path(), "bin", "broken", "echo partial; exit 3");

    capsh_cmd(base.path())
        .args(["-c", "broken"])
        .assert()
        .code(3)
        .stdout("partial\n");
}

#[test]
fn test_runaway_command_is_stopped() {
    let base = TempDir::new().unwrap();
    install(base.path(), "bin", "slow", "echo started; exec sleep 30");

    capsh_cmd(base.path())
        .args(["--timeout-ms", "300", "-c", "slow"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .code(137)
        .stdout("started\n")
        .stderr(predicate::str::contains(
            "capsh: slow: timed out after 300 ms",
        ));
}

#[test]
fn test_realtime_override_inherits_streams() {
    let base = TempDir::new().unwrap();
    install(base.path(), "bin", "live", r#"echo "args: $#"; echo to-stderr >&2"#);

    capsh_cmd(base.path())
        .args(["-c", "live --realtime"])
        .assert()
        .success()
        .stdout("args: 0\n")
        .stderr(predicate::str::contains("to-stderr"));
}

// =============================================================================
// Builtins
// =============================================================================

#[test]
fn test_exit_status_is_returned() {
    let base = TempDir::new().unwrap();

    capsh_cmd(base.path()).args(["-c", "exit 4"]).assert().code(4);
}

#[test]
fn test_pwd_reports_working_directory() {
    let base = TempDir::new().unwrap();
    let canonical = base.path().canonicalize().unwrap();

    capsh_cmd(base.path())
        .current_dir(&canonical)
        .args(["-c", "pwd"])
        .assert()
        .success()
        .stdout(format!("{}\n", canonical.display()));
}

// =============================================================================
// Configuration and startup
// =============================================================================

#[test]
fn test_config_in_base_dir_is_used() {
    let base = TempDir::new().unwrap();
    install(base.path(), "extra", "hello", "echo configured");
    fs::write(
        base.path().join("capsh.toml"),
        "command_dirs = [\"extra\"]\n",
    )
    .unwrap();

    capsh_cmd(base.path())
        .args(["-c", "hello"])
        .assert()
        .success()
        .stdout("configured\n");
}

#[test]
fn test_malformed_config_is_reported() {
    let base = TempDir::new().unwrap();
    fs::write(base.path().join("capsh.toml"), "timeout_ms = \"soon\"\n").unwrap();

    capsh_cmd(base.path())
        .args(["-c", "pwd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let base = TempDir::new().unwrap();

    capsh_cmd(base.path())
        .args(["--config", "/nonexistent/capsh.toml", "-c", "pwd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config"));
}

#[test]
fn test_refuses_non_terminal_input_without_command() {
    let base = TempDir::new().unwrap();

    capsh_cmd(base.path())
        .write_stdin("pwd\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("use -c"));
}
