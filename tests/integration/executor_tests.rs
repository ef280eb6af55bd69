//! Executor behavior against real processes
//!
//! These tests use coreutils (`true`, `echo`, `sleep`, `seq`) and
//! small shell scripts as stand-ins for project commands; the
//! executor does not care what it is running.

use std::thread;
use std::time::Duration;
use tempfile::TempDir;

use shakedown::executor::{run_check, CancelToken};
use shakedown::planner::{CheckDescriptor, CommandSpec};
use shakedown::report::{CheckStatus, FAIL_OUTPUT_CHARS, PASS_OUTPUT_CHARS};

use super::helpers::write_shim;

fn run(descriptor: &CheckDescriptor, timeout: Duration) -> shakedown::report::CheckResult {
    let temp = TempDir::new().expect("Failed to create temp directory");
    run_check(descriptor, temp.path(), timeout, &CancelToken::new())
}

#[test]
fn test_zero_exit_passes_with_stdout_output() {
    let descriptor = CheckDescriptor::new("echo", CommandSpec::new("echo", &["hello"]));
    let result = run(&descriptor, Duration::from_secs(5));
    assert_eq!(result.status, CheckStatus::Pass);
    assert_eq!(result.output, "hello");
}

#[test]
fn test_nonzero_exit_fails_with_description() {
    let descriptor = CheckDescriptor::new("false", CommandSpec::new("false", &[]));
    let result = run(&descriptor, Duration::from_secs(5));
    assert_eq!(result.status, CheckStatus::Fail);
    // No stderr and no stdout, so the failure describes itself
    assert!(result.output.contains("exit code 1 (expected 0)"));
}

#[test]
fn test_expected_exit_can_invert_success() {
    let inverted = CheckDescriptor::new("false", CommandSpec::new("false", &[])).expecting_exit(1);
    assert_eq!(run(&inverted, Duration::from_secs(5)).status, CheckStatus::Pass);

    let strict = CheckDescriptor::new("true", CommandSpec::new("true", &[])).expecting_exit(1);
    let result = run(&strict, Duration::from_secs(5));
    assert_eq!(result.status, CheckStatus::Fail);
    assert!(result.output.contains("exit code 0 (expected 1)"));
}

#[test]
fn test_timeout_kills_process_and_fails() {
    let descriptor = CheckDescriptor::new("sleeper", CommandSpec::new("sleep", &["5"]));
    let result = run(&descriptor, Duration::from_secs(1));
    assert_eq!(result.status, CheckStatus::Fail);
    assert!(result.duration_ms >= 1000);
    assert!(result.duration_ms < 5000);
    assert!(result.output.contains("killed after 1s timeout"));
}

#[test]
fn test_timeout_keeps_stdout_diagnostics() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let shim = write_shim(temp.path(), "hang", "echo stdout-before-hang\nexec sleep 5");
    let descriptor = CheckDescriptor::new(
        "hang",
        CommandSpec::new(shim.to_str().expect("shim path not utf-8"), &[]),
    );

    let result = run_check(
        &descriptor,
        temp.path(),
        Duration::from_secs(1),
        &CancelToken::new(),
    );
    assert_eq!(result.status, CheckStatus::Fail);
    // stderr was silent, so the stdout the child got out survives
    // alongside the termination note
    assert!(result.output.contains("stdout-before-hang"));
    assert!(result.output.contains("killed after 1s timeout"));
}

#[test]
fn test_spawn_failure_becomes_failing_result() {
    let descriptor = CheckDescriptor::new(
        "ghost",
        CommandSpec::new("shakedown-test-no-such-binary", &[]),
    );
    let result = run(&descriptor, Duration::from_secs(5));
    assert_eq!(result.status, CheckStatus::Fail);
    assert!(result
        .output
        .contains("Failed to spawn shakedown-test-no-such-binary"));
}

#[test]
fn test_pass_output_truncated_to_bound() {
    let descriptor = CheckDescriptor::new("chatty", CommandSpec::new("seq", &["1", "10000"]));
    let result = run(&descriptor, Duration::from_secs(10));
    assert_eq!(result.status, CheckStatus::Pass);
    assert!(result.output.chars().count() <= PASS_OUTPUT_CHARS);
    assert!(result.output.ends_with("..."));
}

#[test]
fn test_fail_output_truncated_to_larger_bound() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let shim = write_shim(temp.path(), "noisy-fail", "seq 1 10000 1>&2\nexit 3");
    let descriptor = CheckDescriptor::new(
        "noisy",
        CommandSpec::new(shim.to_str().expect("shim path not utf-8"), &[]),
    );

    let result = run_check(
        &descriptor,
        temp.path(),
        Duration::from_secs(10),
        &CancelToken::new(),
    );
    assert_eq!(result.status, CheckStatus::Fail);
    assert!(result.output.chars().count() <= FAIL_OUTPUT_CHARS);
    assert!(result.output.chars().count() > PASS_OUTPUT_CHARS);
}

#[test]
fn test_stderr_preferred_over_stdout_on_failure() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let shim = write_shim(
        temp.path(),
        "both-streams",
        "echo stdout-text\necho stderr-text 1>&2\nexit 2",
    );
    let descriptor = CheckDescriptor::new(
        "both",
        CommandSpec::new(shim.to_str().expect("shim path not utf-8"), &[]),
    );

    let result = run_check(
        &descriptor,
        temp.path(),
        Duration::from_secs(10),
        &CancelToken::new(),
    );
    assert_eq!(result.status, CheckStatus::Fail);
    assert_eq!(result.output, "stderr-text");
}

#[test]
fn test_failure_pattern_overrides_clean_exit() {
    let descriptor = CheckDescriptor::new(
        "deprecation probe",
        CommandSpec::new("echo", &["(node:42) DeprecationWarning: Buffer() is deprecated"]),
    )
    .failing_on("deprecat");

    let result = run(&descriptor, Duration::from_secs(5));
    assert_eq!(result.status, CheckStatus::Fail);
    // stderr is empty, so the flagged stdout is the diagnostic
    assert!(result.output.contains("DeprecationWarning"));
}

#[test]
fn test_failure_pattern_is_case_insensitive() {
    let descriptor = CheckDescriptor::new(
        "deprecation probe",
        CommandSpec::new("echo", &["WARNING: DEPRECATED API"]),
    )
    .failing_on("deprecat");
    assert_eq!(run(&descriptor, Duration::from_secs(5)).status, CheckStatus::Fail);

    let clean = CheckDescriptor::new(
        "deprecation probe",
        CommandSpec::new("echo", &["all good"]),
    )
    .failing_on("deprecat");
    assert_eq!(run(&clean, Duration::from_secs(5)).status, CheckStatus::Pass);
}

#[test]
fn test_env_override_reaches_child() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let shim = write_shim(temp.path(), "env-probe", "echo \"opts=$NODE_OPTIONS\"");
    let descriptor = CheckDescriptor::new(
        "env",
        CommandSpec::new(shim.to_str().expect("shim path not utf-8"), &[])
            .with_env("NODE_OPTIONS", "--trace-warnings"),
    );

    let result = run_check(
        &descriptor,
        temp.path(),
        Duration::from_secs(10),
        &CancelToken::new(),
    );
    assert_eq!(result.status, CheckStatus::Pass);
    assert_eq!(result.output, "opts=--trace-warnings");
}

#[test]
fn test_pre_cancelled_token_kills_immediately() {
    let cancel = CancelToken::new();
    cancel.cancel();

    let temp = TempDir::new().expect("Failed to create temp directory");
    let descriptor = CheckDescriptor::new("sleeper", CommandSpec::new("sleep", &["5"]));
    let result = run_check(&descriptor, temp.path(), Duration::from_secs(30), &cancel);

    assert_eq!(result.status, CheckStatus::Fail);
    assert!(result.output.contains("cancelled before completion"));
    assert!(result.duration_ms < 5000);
}

#[test]
fn test_cancellation_mid_flight_terminates_child() {
    let cancel = CancelToken::new();
    let flipper = cancel.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        flipper.cancel();
    });

    let temp = TempDir::new().expect("Failed to create temp directory");
    let descriptor = CheckDescriptor::new("sleeper", CommandSpec::new("sleep", &["10"]));
    let result = run_check(&descriptor, temp.path(), Duration::from_secs(30), &cancel);
    handle.join().expect("flipper thread panicked");

    assert_eq!(result.status, CheckStatus::Fail);
    assert!(result.output.contains("cancelled before completion"));
    assert!(result.duration_ms < 10_000);
}
