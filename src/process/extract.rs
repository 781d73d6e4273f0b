// src/process/extract.rs
use std::{
    collections::HashSet,
    fs::{self, File},
    io,
    path::Path,
};
use tracing::{debug, error, info, instrument, warn};
use zip::ZipArchive;

use crate::config::FailurePolicy;
use crate::error::{FarsError, Result};
use crate::process::{matching_files, StageReport};
use crate::year::{infer_year, Year};

/// Unpacks every `FARS*.zip` in `zip_dir` into `unzip_dir/<year>/`.
///
/// A year whose directory already exists is skipped, however complete its
/// contents are. Returns the years extracted by this call.
#[instrument(level = "info", skip(zip_dir, unzip_dir), fields(src = %zip_dir.as_ref().display()))]
pub fn extract_archives(
    zip_dir: impl AsRef<Path>,
    unzip_dir: impl AsRef<Path>,
    policy: FailurePolicy,
) -> Result<StageReport<Year>> {
    let unzip_dir = unzip_dir.as_ref();
    let mut report = StageReport::default();

    for archive_path in matching_files(zip_dir.as_ref(), "fars*.zip")? {
        match extract_one(&archive_path, unzip_dir) {
            Ok(Some(year)) => report.completed.push(year),
            Ok(None) => {}
            Err(e) => match policy {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::Continue => {
                    error!(archive = %archive_path.display(), error = %e, "extraction failed");
                    report.failures.push(e);
                }
            },
        }
    }

    Ok(report)
}

fn extract_one(archive_path: &Path, unzip_dir: &Path) -> Result<Option<Year>> {
    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let year = infer_year(&name).ok_or_else(|| FarsError::NoYear { name: name.clone() })?;

    let destination = unzip_dir.join(year.to_string());
    if destination.exists() {
        debug!(%year, file = %name, "already extracted");
        return Ok(None);
    }

    let file = File::open(archive_path).map_err(|e| FarsError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|source| FarsError::Archive {
        path: archive_path.to_path_buf(),
        source,
    })?;

    fs::create_dir(&destination).map_err(|e| FarsError::io(&destination, e))?;
    info!(%year, file = %name, "unzipping");

    let mut written = HashSet::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|source| FarsError::Archive {
            path: archive_path.to_path_buf(),
            source,
        })?;
        if entry.is_dir() {
            continue;
        }
        // flatten: only the final path component is kept
        let Some(file_name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_os_string()))
        else {
            debug!(entry = entry.name(), "skipping entry outside the archive root");
            continue;
        };

        if !written.insert(file_name.clone()) {
            warn!(%year, entry = entry.name(), "entries share a file name; later one wins");
        }
        let out_path = destination.join(file_name);
        let mut out = File::create(&out_path).map_err(|e| FarsError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| FarsError::io(&out_path, e))?;
    }

    Ok(Some(year))
}
