//! Isolated execution of a single check
//!
//! Every execution outcome here becomes a [`CheckResult`]: unexpected
//! exit codes, flagged output, timeouts, forceful termination, and
//! even failure to spawn. Nothing a child process does can abort the
//! surrounding run.

use anyhow::{Context, Result};
use regex::RegexBuilder;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

use crate::planner::CheckDescriptor;
use crate::report::CheckResult;

/// Interval between cancellation checks while waiting on a child
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timeout for collecting output from child process pipes
const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Cap on bytes kept per stream (1MB). This bounds memory and the
/// failure-pattern scan window; the much tighter report bounds apply
/// when the result is built.
const MAX_STREAM_BYTES: usize = 1024 * 1024;

/// Cooperative cancellation flag, shared with the Ctrl-C handler
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    WaitFailed(std::io::Error),
}

/// Run one check to completion and reduce it to a result.
///
/// The child runs with the project directory as its working directory,
/// stdin closed, and both output streams piped. `duration` is
/// wall-clock time from spawn to verdict regardless of outcome.
pub fn run_check(
    descriptor: &CheckDescriptor,
    project_dir: &Path,
    timeout: Duration,
    cancel: &CancelToken,
) -> CheckResult {
    let start = Instant::now();

    let mut child = match spawn(descriptor, project_dir) {
        Ok(child) => child,
        Err(err) => {
            return CheckResult::failed(&descriptor.label, start.elapsed(), &format!("{err:#}"));
        }
    };

    // Drain both pipes before waiting. A child that fills the ~64KB
    // pipe buffer would otherwise block on write() and never exit.
    let stdout_rx = drain_stream(child.stdout.take());
    let stderr_rx = drain_stream(child.stderr.take());

    let outcome = wait_for(&mut child, timeout, cancel);
    if !matches!(outcome, WaitOutcome::Exited(_)) {
        // Kill first so the pipes close and the reader threads finish
        kill_child(&mut child);
    }
    let duration = start.elapsed();

    let stdout = collect(stdout_rx);
    let stderr = collect(stderr_rx);

    match outcome {
        WaitOutcome::Exited(status) => evaluate(descriptor, status, &stdout, &stderr, duration),
        WaitOutcome::TimedOut => CheckResult::failed(
            &descriptor.label,
            duration,
            &with_note(
                &stdout,
                &stderr,
                &format!("[killed after {}s timeout]", timeout.as_secs()),
            ),
        ),
        WaitOutcome::Cancelled => CheckResult::failed(
            &descriptor.label,
            duration,
            &with_note(&stdout, &stderr, "[cancelled before completion]"),
        ),
        WaitOutcome::WaitFailed(err) => CheckResult::failed(
            &descriptor.label,
            duration,
            &failure_output(&stdout, &stderr, &format!("wait failed: {err}")),
        ),
    }
}

/// Compare the exit code against the descriptor's expectation and scan
/// output for the failure pattern, if one is set
fn evaluate(
    descriptor: &CheckDescriptor,
    status: ExitStatus,
    stdout: &str,
    stderr: &str,
    duration: Duration,
) -> CheckResult {
    let exit_code = status.code().unwrap_or(-1);

    if let Some(line) = flagged_line(descriptor, stdout, stderr) {
        return CheckResult::failed(
            &descriptor.label,
            duration,
            &failure_output(stdout, stderr, &format!("output matched failure pattern: {line}")),
        );
    }

    if exit_code == descriptor.expected_exit {
        CheckResult::passed(&descriptor.label, duration, stdout)
    } else {
        CheckResult::failed(
            &descriptor.label,
            duration,
            &failure_output(
                stdout,
                stderr,
                &format!("exit code {exit_code} (expected {})", descriptor.expected_exit),
            ),
        )
    }
}

fn spawn(descriptor: &CheckDescriptor, project_dir: &Path) -> Result<Child> {
    let spec = &descriptor.command;
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(project_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &spec.envs {
        command.env(key, value);
    }
    command
        .spawn()
        .with_context(|| format!("Failed to spawn {}", spec.program))
}

/// Wait for the child in short slices so cancellation stays responsive
/// while the overall deadline is enforced
fn wait_for(child: &mut Child, timeout: Duration, cancel: &CancelToken) -> WaitOutcome {
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        let now = Instant::now();
        if now >= deadline {
            return WaitOutcome::TimedOut;
        }
        let slice = WAIT_POLL_INTERVAL.min(deadline - now);
        match child.wait_timeout(slice) {
            Ok(Some(status)) => return WaitOutcome::Exited(status),
            Ok(None) => {}
            Err(err) => return WaitOutcome::WaitFailed(err),
        }
    }
}

/// Read a stream to completion on a separate thread, capped at
/// [`MAX_STREAM_BYTES`] so a chatty child cannot exhaust memory
fn drain_stream<R: Read + Send + 'static>(stream: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    match stream {
        Some(stream) => {
            thread::spawn(move || {
                let _ = tx.send(read_capped(stream));
            });
        }
        None => {
            let _ = tx.send(String::new());
        }
    }
    rx
}

fn read_capped<R: Read>(mut stream: R) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let remaining = MAX_STREAM_BYTES.saturating_sub(buf.len());
                let keep = n.min(remaining);
                buf.extend_from_slice(&chunk[..keep]);
                if keep < n {
                    // At the cap: discard the rest but keep draining so
                    // the child never blocks on a full pipe
                    while stream.read(&mut chunk).unwrap_or(0) > 0 {}
                    break;
                }
            }
            Err(_) => {
                if buf.is_empty() {
                    return "[error reading output]".to_string();
                }
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn collect(rx: Receiver<String>) -> String {
    rx.recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
        .unwrap_or_else(|_| "[output collection timed out]".to_string())
}

fn kill_child(child: &mut Child) {
    // Errors ignored; the process may have already exited
    let _ = child.kill();
    let _ = child.wait();
}

/// First output line matching the descriptor's failure pattern, if any.
/// Matching is case-insensitive; stdout is scanned before stderr.
fn flagged_line(descriptor: &CheckDescriptor, stdout: &str, stderr: &str) -> Option<String> {
    let pattern = descriptor.failure_pattern.as_deref()?;
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .ok()?;
    stdout
        .lines()
        .chain(stderr.lines())
        .find(|line| regex.is_match(line))
        .map(|line| line.to_string())
}

/// Pick the most diagnostic text for a failing result: stderr first,
/// then stdout, then the failure's own description
fn failure_output(stdout: &str, stderr: &str, reason: &str) -> String {
    if !stderr.trim().is_empty() {
        stderr.to_string()
    } else if !stdout.trim().is_empty() {
        stdout.to_string()
    } else {
        reason.to_string()
    }
}

/// Append a termination note to whatever the child produced before it
/// was killed, preferring stderr over stdout like every other failure
fn with_note(stdout: &str, stderr: &str, note: &str) -> String {
    let text = if stderr.trim().is_empty() {
        stdout
    } else {
        stderr
    };
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        note.to_string()
    } else {
        format!("{trimmed}\n{note}")
    }
}
