//! Shared test helpers: temp projects, fake npm/node shims, PATH control

use std::env;
use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use shakedown::report::{CheckResult, Report};

/// Minimal manifest: no dependencies, no scripts
pub const EMPTY_MANIFEST: &str = r#"{ "name": "fixture", "dependencies": {}, "scripts": {} }"#;

/// Test helper: Create a temp project directory containing the given
/// package.json body
pub fn project_with_manifest(manifest: &str) -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    fs::write(temp.path().join("package.json"), manifest).expect("Failed to write package.json");
    temp
}

/// Test helper: Write an executable `#!/bin/sh` script into `dir`
pub fn write_shim(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write shim");
    let mut perms = fs::metadata(&path)
        .expect("Failed to stat shim")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("Failed to mark shim executable");
    path
}

/// Test helper: Prepend a directory to PATH, restoring the original on
/// drop. Tests using this must be `#[serial]` since PATH is process
/// state.
pub struct PathOverride {
    original: OsString,
}

impl PathOverride {
    pub fn prepend(dir: &Path) -> Self {
        let original = env::var_os("PATH").unwrap_or_default();
        let mut updated = dir.as_os_str().to_os_string();
        updated.push(":");
        updated.push(&original);
        env::set_var("PATH", updated);
        Self { original }
    }
}

impl Drop for PathOverride {
    fn drop(&mut self) {
        env::set_var("PATH", &self.original);
    }
}

/// Test helper: Load and parse the persisted report for a subject
pub fn load_report(dir: &Path, subject: &str) -> Report {
    let path = dir.join(Report::file_name(subject));
    let content = fs::read_to_string(&path).expect("Failed to read report file");
    serde_json::from_str(&content).expect("Failed to parse report file")
}

/// Test helper: Find a result by label, panicking if absent
pub fn result_labeled<'a>(report: &'a Report, label: &str) -> &'a CheckResult {
    report
        .checks
        .iter()
        .find(|c| c.label == label)
        .unwrap_or_else(|| panic!("no check labeled '{label}' in report"))
}
