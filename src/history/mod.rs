// src/history/mod.rs
//
// "Done" is tracked purely by presence on disk: a year counts as extracted
// or converted as soon as its directory exists.

use std::{collections::BTreeSet, fs, path::Path};

use crate::error::{FarsError, Result};

/// Names of the subdirectories of `dir`. A missing `dir` yields an empty set.
pub fn dir_names(dir: &Path) -> Result<BTreeSet<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(FarsError::io(dir, e)),
    };

    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect())
}

/// Year directories present under `unzipped_dir` but absent from
/// `csv_dir`, in name order. Only directory names are compared; a
/// half-converted year with an existing output directory is not pending.
pub fn pending_years(unzipped_dir: &Path, csv_dir: &Path) -> Result<Vec<String>> {
    let extracted = dir_names(unzipped_dir)?;
    let converted = dir_names(csv_dir)?;
    Ok(extracted.difference(&converted).cloned().collect())
}
