use std::process::{Command, Output};

fn threadsd(args: &[&str], env: &[(&str, &str)]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_threadsd"))
        .args(args)
        .envs(env.iter().copied())
        .output()
        .unwrap()
}

#[test]
fn test_malformed_flag_exits_with_failure() {
    let output = threadsd(&["--connLowWater=abc"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connLowWater"));
}

#[test]
fn test_malformed_duration_exits_with_failure() {
    assert_eq!(threadsd(&["--keepAliveInterval=5"], &[]).status.code(), Some(1));
}

#[test]
fn test_malformed_env_value_exits_with_failure() {
    let output = threadsd(&[], &[("THREADS_CONNGRACEPERIOD", "bogus")]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_unknown_flag_exits_with_failure() {
    assert_eq!(threadsd(&["--noSuchFlag"], &[]).status.code(), Some(1));
}

#[test]
fn test_validation_error_exits_with_failure() {
    let output = threadsd(&["--mongoUri=mongodb://127.0.0.1:27017"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("mongoDatabase"));
}

#[test]
fn test_help_exits_cleanly() {
    let output = threadsd(&["--help"], &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--hostAddr"));
}
