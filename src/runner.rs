//! Sequential check execution with progress output and persistence
//!
//! The runner owns the full pipeline: load the manifest, plan, run
//! each check in order, render the console summary, and write the
//! report. Per-check failures are data; only the two fatal outcomes in
//! [`RunError`] terminate a run abnormally.

use colored::Colorize;
use std::sync::Once;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::RunConfig;
use crate::executor::{run_check, CancelToken};
use crate::manifest::Manifest;
use crate::planner::{plan_checks, CheckDescriptor};
use crate::report::{CheckResult, CheckStatus, Report};

/// Maximum output lines echoed per failure in the console summary
const MAX_FAILURE_OUTPUT_LINES: usize = 5;

static CTRLC_INSTALLED: Once = Once::new();

/// Fatal outcomes of a run
#[derive(Debug, Error)]
pub enum RunError {
    /// The manifest could not be located or parsed. Nothing was
    /// executed and no report exists.
    #[error("manifest precondition failed: {0:#}")]
    Manifest(anyhow::Error),
    /// Checks ran but the report could not be written. Results exist
    /// only in console form.
    #[error("report persistence failed: {0:#}")]
    Persist(anyhow::Error),
}

impl RunError {
    /// Process exit code for this failure class
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Manifest(_) => 2,
            RunError::Persist(_) => 3,
        }
    }
}

/// Run the full verification pipeline for the configured project.
///
/// Returns the assembled report for any run that completed, whether or
/// not individual checks failed; the caller decides the process exit.
pub fn execute(config: &RunConfig) -> Result<Report, RunError> {
    let manifest = Manifest::load(&config.project_dir).map_err(RunError::Manifest)?;

    if which::which("npm").is_err() {
        eprintln!(
            "{} npm not found on PATH; npm-based checks will fail",
            "⚠".yellow()
        );
    }

    let checks = plan_checks(&manifest, config);
    print_header(config, checks.len());

    let cancel = CancelToken::new();
    install_ctrlc_handler(&cancel);

    let started = Instant::now();
    let results = run_all(&checks, config, &cancel);
    let elapsed = started.elapsed();

    if cancel.is_cancelled() {
        println!(
            "\n{}",
            "Run cancelled; remaining checks recorded as not run".yellow()
        );
    }

    let report = Report::from_results(&config.subject, results);
    print_summary(&report, elapsed);
    print_failures(&checks, &report);

    let path = report.save(config.report_dir()).map_err(RunError::Persist)?;
    println!("{}", format!("Report written to {}", path.display()).dimmed());

    Ok(report)
}

/// Execute every planned check in order. Cancellation marks the
/// remainder as not run; nothing here short-circuits on failure.
fn run_all(
    checks: &[CheckDescriptor],
    config: &RunConfig,
    cancel: &CancelToken,
) -> Vec<CheckResult> {
    let mut results = Vec::with_capacity(checks.len());
    for descriptor in checks {
        let result = if cancel.is_cancelled() {
            CheckResult::not_run(&descriptor.label)
        } else {
            run_check(descriptor, &config.project_dir, config.check_timeout, cancel)
        };
        print_progress(&result);
        results.push(result);
    }
    results
}

/// A second Ctrl-C is left to the default handler, so a stuck child
/// cannot trap the user. ctrlc allows one handler per process; the
/// first run to install it wins, which is the only run a process has.
fn install_ctrlc_handler(cancel: &CancelToken) {
    let token = cancel.clone();
    CTRLC_INSTALLED.call_once(|| {
        if let Err(err) = ctrlc::set_handler(move || {
            token.cancel();
        }) {
            eprintln!("{} Failed to set Ctrl-C handler: {err}", "⚠".yellow());
        }
    });
}

fn print_header(config: &RunConfig, total: usize) {
    let noun = if total == 1 { "check" } else { "checks" };
    let swap_note = match &config.previous {
        Some(previous) => format!(" (replacing '{previous}')"),
        None => String::new(),
    };
    println!(
        "{} Running {} {} for '{}'{}...\n",
        "→".cyan().bold(),
        total,
        noun,
        config.subject,
        swap_note
    );
}

fn print_progress(result: &CheckResult) {
    match result.status {
        CheckStatus::Pass => println!(
            "  {} {} {}",
            "✓".green().bold(),
            result.label,
            format!("({}ms)", result.duration_ms).dimmed()
        ),
        CheckStatus::Fail => println!(
            "  {} {} {}",
            "✗".red(),
            result.label,
            format!("({}ms)", result.duration_ms).dimmed()
        ),
        CheckStatus::NotRun => println!(
            "  {} {}",
            "−".dimmed(),
            format!("{} (not run)", result.label).dimmed()
        ),
    }
}

fn print_summary(report: &Report, elapsed: Duration) {
    let summary = &report.summary;
    let counts = if summary.not_run > 0 {
        format!(
            "{} passed, {} failed, {} not run, {} total",
            summary.passed, summary.failed, summary.not_run, summary.total
        )
    } else {
        format!(
            "{} passed, {} failed, {} total",
            summary.passed, summary.failed, summary.total
        )
    };
    let marker = if report.all_passed() {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!(
        "\n{} {} {}",
        marker,
        counts,
        format!("({:.1}s)", elapsed.as_secs_f64()).dimmed()
    );
}

/// Echo each failure with the command that ran and a short excerpt, so
/// triage does not require opening the persisted report
fn print_failures(checks: &[CheckDescriptor], report: &Report) {
    if report.summary.failed == 0 {
        return;
    }

    println!("\n{}", "Failures:".bold());
    for (descriptor, result) in checks.iter().zip(&report.checks) {
        if result.status != CheckStatus::Fail {
            continue;
        }
        println!("  {} {}", "✗".red(), result.label);
        println!("    {}", format!("$ {}", descriptor.command).dimmed());
        for line in result.output.lines().take(MAX_FAILURE_OUTPUT_LINES) {
            println!("    {line}");
        }
    }
}
