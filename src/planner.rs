//! Check planning: decide which verifications apply to a project
//!
//! Planning is a pure function of the manifest and the run
//! configuration. Nothing is spawned and nothing is read from disk
//! here; the output is an ordered list of descriptors the executor
//! runs one at a time.

use std::borrow::Cow;
use std::fmt;

use crate::config::RunConfig;
use crate::manifest::Manifest;

/// Exit code grep reports when no line matched
const GREP_NO_MATCHES: i32 = 1;

/// Case-insensitive substring that marks a deprecation warning in
/// test output
const DEPRECATION_PATTERN: &str = "deprecat";

/// Script for the manifest-removal check. The package name arrives via
/// argv, so it can never alter the script text.
const MANIFEST_REMOVAL_SCRIPT: &str = "\
const manifest = require('./package.json');
const name = process.argv[1];
const sections = ['dependencies', 'devDependencies'].filter(
  (section) => manifest[section] && Object.prototype.hasOwnProperty.call(manifest[section], name)
);
if (sections.length > 0) {
  console.error(name + ' still listed in ' + sections.join(' and '));
  process.exit(1);
}
";

/// An external invocation held as a fixed program plus an argument
/// vector. User-supplied identifiers travel as individual arguments
/// and are never interpolated into shell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Environment overrides applied on top of the inherited environment
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    /// Fixed program with a fixed argument list
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            envs: Vec::new(),
        }
    }

    /// Fixed program with dynamically assembled arguments
    pub fn with_args(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
            envs: Vec::new(),
        }
    }

    /// Add an environment override for this invocation only
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }
}

impl fmt::Display for CommandSpec {
    /// Render as a copy-pasteable shell line. Display only; execution
    /// always goes through the argument vector.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.envs {
            write!(f, "{}={} ", key, shell_escape::escape(Cow::Borrowed(value)))?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", shell_escape::escape(Cow::Borrowed(arg)))?;
        }
        Ok(())
    }
}

/// A planned unit of verification, not yet executed
#[derive(Debug, Clone)]
pub struct CheckDescriptor {
    /// Human-readable name, unique within a run
    pub label: String,
    /// The invocation to run, opaque to the executor beyond spawning it
    pub command: CommandSpec,
    /// Exit code that counts as success
    pub expected_exit: i32,
    /// Case-insensitive pattern that fails the check whenever any output
    /// line matches, regardless of exit code
    pub failure_pattern: Option<String>,
}

impl CheckDescriptor {
    pub fn new(label: &str, command: CommandSpec) -> Self {
        Self {
            label: label.to_string(),
            command,
            expected_exit: 0,
            failure_pattern: None,
        }
    }

    /// Override the exit code that counts as success
    pub fn expecting_exit(mut self, code: i32) -> Self {
        self.expected_exit = code;
        self
    }

    /// Fail the check when any output line matches this pattern
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.failure_pattern = Some(pattern.to_string());
        self
    }
}

/// Decide which checks apply to the project, in report order.
///
/// Rules are evaluated in a fixed order and gated independently:
/// dependency resolution always runs; type check requires a declared
/// typescript dependency; test, lint, and build require the matching
/// scripts; the two swap checks require a previous package; the
/// deprecation check rides along with the test suite.
pub fn plan_checks(manifest: &Manifest, config: &RunConfig) -> Vec<CheckDescriptor> {
    let mut checks = Vec::new();

    checks.push(CheckDescriptor::new(
        "dependency resolution",
        CommandSpec::new("npm", &["install"]),
    ));

    if manifest.declares_dependency("typescript") {
        checks.push(CheckDescriptor::new(
            "type check",
            CommandSpec::new("npx", &["tsc", "--noEmit"]),
        ));
    }

    let has_tests = manifest.has_real_test_script();
    if has_tests {
        checks.push(CheckDescriptor::new(
            "test suite",
            CommandSpec::new("npm", &["test"]),
        ));
    }

    if manifest.script("lint").is_some() {
        checks.push(CheckDescriptor::new(
            "lint",
            CommandSpec::new("npm", &["run", "lint"]),
        ));
    }

    if manifest.script("build").is_some() {
        checks.push(CheckDescriptor::new(
            "build",
            CommandSpec::new("npm", &["run", "build"]),
        ));
    }

    if let Some(previous) = &config.previous {
        checks.push(stale_reference_check(previous, config));
        checks.push(manifest_removal_check(previous));
    }

    if has_tests {
        checks.push(
            CheckDescriptor::new(
                "deprecation warnings",
                CommandSpec::new("npm", &["test"])
                    .with_env("NODE_OPTIONS", "--trace-deprecation"),
            )
            .failing_on(DEPRECATION_PATTERN),
        );
    }

    checks
}

/// Recursive fixed-string search for the removed package across source
/// files. grep exits 1 when nothing matched, so that is the passing
/// exit code; a hit leaves the offending lines on stdout for the
/// failure output.
fn stale_reference_check(previous: &str, config: &RunConfig) -> CheckDescriptor {
    let mut args = vec!["-r".to_string(), "-n".to_string(), "-F".to_string()];
    for ext in &config.source_extensions {
        args.push(format!("--include=*.{ext}"));
    }
    for dir in &config.excluded_dirs {
        args.push(format!("--exclude-dir={dir}"));
    }
    args.push("--".to_string());
    args.push(previous.to_string());
    args.push(".".to_string());

    CheckDescriptor::new("stale references", CommandSpec::with_args("grep", args))
        .expecting_exit(GREP_NO_MATCHES)
}

/// Confirm the removed package is gone from both dependency tables
fn manifest_removal_check(previous: &str) -> CheckDescriptor {
    CheckDescriptor::new(
        "manifest removal",
        CommandSpec::with_args(
            "node",
            vec![
                "-e".to_string(),
                MANIFEST_REMOVAL_SCRIPT.to_string(),
                previous.to_string(),
            ],
        ),
    )
}
