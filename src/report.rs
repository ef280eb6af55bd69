//! Verification results and the persisted report
//!
//! A report is assembled once, after the last check completes, and
//! written synchronously before the process exits. Repeated runs for
//! the same subject overwrite the same file.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Output kept in a passing result
pub const PASS_OUTPUT_CHARS: usize = 500;

/// Output kept in a failing result, larger to favor diagnostic detail
pub const FAIL_OUTPUT_CHARS: usize = 1000;

/// Outcome classification for a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    /// Expected exit code and no flagged output
    #[serde(rename = "pass")]
    Pass,
    /// Unexpected exit, flagged output, timeout, or spawn failure
    #[serde(rename = "fail")]
    Fail,
    /// Left unexecuted after mid-run cancellation
    #[serde(rename = "not_run")]
    NotRun,
}

/// The outcome of executing one descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub label: String,
    pub status: CheckStatus,
    pub duration_ms: u64,
    pub output: String,
}

impl CheckResult {
    /// Build a passing result, output truncated to the pass bound
    pub fn passed(label: &str, duration: Duration, output: &str) -> Self {
        Self {
            label: label.to_string(),
            status: CheckStatus::Pass,
            duration_ms: duration.as_millis() as u64,
            output: truncate_chars(output.trim_end(), PASS_OUTPUT_CHARS),
        }
    }

    /// Build a failing result, output truncated to the fail bound
    pub fn failed(label: &str, duration: Duration, output: &str) -> Self {
        Self {
            label: label.to_string(),
            status: CheckStatus::Fail,
            duration_ms: duration.as_millis() as u64,
            output: truncate_chars(output.trim_end(), FAIL_OUTPUT_CHARS),
        }
    }

    /// Build a result for a check skipped by cancellation
    pub fn not_run(label: &str) -> Self {
        Self {
            label: label.to_string(),
            status: CheckStatus::NotRun,
            duration_ms: 0,
            output: String::new(),
        }
    }
}

/// Aggregate counts over one run. `not_run` stays out of the
/// serialized form on the common path where nothing was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub not_run: usize,
    pub total: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// The terminal artifact of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    pub summary: RunSummary,
    pub checks: Vec<CheckResult>,
}

impl Report {
    /// Assemble the report from results in execution order
    pub fn from_results(subject: &str, checks: Vec<CheckResult>) -> Self {
        let passed = count(&checks, CheckStatus::Pass);
        let failed = count(&checks, CheckStatus::Fail);
        let not_run = count(&checks, CheckStatus::NotRun);
        Self {
            subject: subject.to_string(),
            timestamp: Utc::now(),
            summary: RunSummary {
                passed,
                failed,
                not_run,
                total: checks.len(),
            },
            checks,
        }
    }

    /// Whether every planned check executed and passed
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0 && self.summary.not_run == 0
    }

    /// Deterministic file name for a subject, so repeated runs for the
    /// same subject overwrite rather than accumulate
    pub fn file_name(subject: &str) -> String {
        format!("verification-report-{}.json", sanitize(subject))
    }

    /// Write the report as pretty-printed JSON. Synchronous: the run is
    /// not over until this completes or fails observably.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
        let path = dir.join(Self::file_name(&self.subject));
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(path)
    }
}

fn count(checks: &[CheckResult], status: CheckStatus) -> usize {
    checks.iter().filter(|c| c.status == status).count()
}

/// Keep alphanumerics and `@ . _ -`; anything else (notably the `/` in
/// scoped package names) becomes `-` so the file name stays a single
/// path component.
fn sanitize(subject: &str) -> String {
    subject
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Truncate by character count so multi-byte boundaries are never split
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
