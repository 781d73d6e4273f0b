// src/process/mod.rs
use glob::{glob_with, MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{FarsError, Result};

pub mod convert;
pub mod extract;

pub use convert::{convert_tables, ConversionSummary};
pub use extract::extract_archives;

/// What a fetch or extract pass did: the items it completed and, under
/// `FailurePolicy::Continue`, the per-year failures it stepped over.
#[derive(Debug)]
pub struct StageReport<T> {
    pub completed: Vec<T>,
    pub failures: Vec<FarsError>,
}

impl<T> Default for StageReport<T> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Regular files directly under `dir` whose name matches `pattern`
/// (a glob such as `fars*.zip`), ignoring case. Sorted by path.
pub fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let full = format!("{}/{}", Pattern::escape(&dir.to_string_lossy()), pattern);

    let mut files = Vec::new();
    for entry in glob_with(&full, options)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable directory entry"),
        }
    }
    files.sort();
    Ok(files)
}
