//! Project manifest (package.json) loading and inspection
//!
//! The manifest is the planner's only input besides the run
//! configuration. Loading it is the one precondition of a run: if it
//! cannot be read or parsed, nothing is planned and nothing executes.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// npm writes this sentinel into the test script of freshly initialized
/// projects; a script containing it counts as no test suite at all
const PLACEHOLDER_TEST_SENTINEL: &str = "Error: no test specified";

/// Fields of package.json the planner cares about. Everything else in
/// the file is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

impl Manifest {
    /// Load the manifest from `<project_dir>/package.json`
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join("package.json");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Whether the package appears in dependencies or devDependencies
    pub fn declares_dependency(&self, package: &str) -> bool {
        self.dependencies.contains_key(package) || self.dev_dependencies.contains_key(package)
    }

    /// The body of a named script, if defined
    pub fn script(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).map(String::as_str)
    }

    /// Whether the project defines a real test script, as opposed to the
    /// placeholder npm generates
    pub fn has_real_test_script(&self) -> bool {
        self.script("test")
            .map(|body| !body.contains(PLACEHOLDER_TEST_SENTINEL))
            .unwrap_or(false)
    }
}
