//! Exit status and output of the `check_backend_isolation` binary.

use std::process::Command;

use rllite::NO_TF_IMPORT_ENV;

fn isolation_check() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_check_backend_isolation"));
    cmd.env_remove(NO_TF_IMPORT_ENV);
    cmd
}

#[test]
fn test_clean_run_prints_ok() {
    let output = isolation_check().output().unwrap();
    assert!(
        output.status.success(),
        "exit {:?}, stderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ok\n");
}

#[test]
fn test_flag_already_set_fails() {
    let output = isolation_check().env(NO_TF_IMPORT_ENV, "1").output().unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("suppression flag already set"), "stderr: {}", stderr);
}
