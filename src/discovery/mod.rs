//! Test discovery
//!
//! Finds test files under the given paths and resolves each one to the test
//! module registered for it.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::Module;

/// Suffix a file name must carry to count as a test file
const TEST_FILE_SUFFIX: &str = "test.rs";

/// True for files named like `something_test.rs`, case-insensitively.
/// A bare `test.rs` does not qualify.
pub fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| {
            let name = name.to_lowercase();
            name.len() > TEST_FILE_SUFFIX.len() && name.ends_with(TEST_FILE_SUFFIX)
        })
        .unwrap_or(false)
}

/// Suite name for a test file: its stem
pub fn suite_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Walk a file or directory and return the absolute paths of matching files,
/// sorted case-insensitively. A missing path is logged and yields nothing.
pub fn list_tree(path: &Path, filter: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        warn!("Path not found: {}", path.display());
        return Ok(Vec::new());
    }

    let root = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", path.display()))?;

    let mut found = Vec::new();
    walk(&root, &filter, &mut found)?;
    found.sort_by_key(|p| p.to_string_lossy().to_lowercase());

    debug!("Found {} test file(s) under {}", found.len(), root.display());
    Ok(found)
}

fn walk(path: &Path, filter: &dyn Fn(&Path) -> bool, found: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_dir() {
        let entries = fs::read_dir(path)
            .with_context(|| format!("Failed to read directory: {}", path.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to read entry in {}", path.display()))?;
            let entry_path = entry.path();
            // Linked directories may point back up the tree
            if entry.file_type().is_ok_and(|t| t.is_symlink()) && entry_path.is_dir() {
                debug!("Skipping linked directory {}", entry_path.display());
                continue;
            }
            walk(&entry_path, filter, found)?;
        }
    } else if path.is_file() && filter(path) {
        found.push(path.to_path_buf());
    }
    Ok(())
}

/// Turns a test file into its exported tests
pub trait ModuleLoader {
    fn load(&self, path: &Path) -> Result<Module>;
}

type ModuleFactory = Box<dyn Fn() -> Result<Module>>;

/// Loader backed by modules compiled into the binary, keyed by file stem
#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        stem: impl Into<String>,
        factory: impl Fn() -> Result<Module> + 'static,
    ) -> Self {
        self.modules.insert(stem.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, stem: &str) -> bool {
        self.modules.contains_key(stem)
    }

    /// Registered stems in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load(&self, path: &Path) -> Result<Module> {
        let stem = suite_name(path);
        match self.modules.get(&stem) {
            Some(factory) => factory().with_context(|| format!("Failed to load module '{stem}'")),
            None => bail!("No test module registered for '{}'", stem),
        }
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}
