//! Configuration for a verification run

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for a single check (2 minutes)
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(120);

/// Source file extensions scanned by the stale-reference check
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs"];

/// Directories the stale-reference check never descends into
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["node_modules", "dist", "build", "coverage", ".git"];

/// Configuration for a verification run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Package that was upgraded or swapped in
    pub subject: String,
    /// Package that was removed in a swap, if any
    pub previous: Option<String>,
    /// Project directory all checks run in
    pub project_dir: PathBuf,
    /// Where the report is written; `None` means the project directory
    pub report_dir: Option<PathBuf>,
    /// Maximum time to wait for a single check to complete
    pub check_timeout: Duration,
    /// Source file extensions scanned for stale references
    pub source_extensions: Vec<String>,
    /// Directories excluded from the stale-reference scan
    pub excluded_dirs: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            subject: "unknown".to_string(),
            previous: None,
            project_dir: PathBuf::from("."),
            report_dir: None,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            source_extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl RunConfig {
    /// Create a configuration for verifying the given package
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            ..Self::default()
        }
    }

    /// Record the package this subject replaced, enabling swap checks
    pub fn with_previous(mut self, previous: &str) -> Self {
        self.previous = Some(previous.to_string());
        self
    }

    /// Set the project directory checks run in
    pub fn with_project_dir(mut self, dir: &Path) -> Self {
        self.project_dir = dir.to_path_buf();
        self
    }

    /// Set a custom per-check timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Directory the report is written to
    pub fn report_dir(&self) -> &Path {
        self.report_dir.as_deref().unwrap_or(&self.project_dir)
    }
}
