use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::error::{FarsError, Result};

pub const ZIPPED_DIR: &str = "zipped";
pub const UNZIPPED_DIR: &str = "unzipped";
pub const CSV_DIR: &str = "csv";

/// The three working directories under the data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Downloaded `FARS*.zip` archives.
    pub zipped: PathBuf,
    /// One subdirectory per year holding the extracted DBF tables.
    pub unzipped: PathBuf,
    /// One subdirectory per year holding the converted CSV files.
    pub csv: PathBuf,
}

/// Creates `base` and its `zipped`, `unzipped` and `csv` children when
/// missing. Existing directories are left alone.
pub fn init_layout(base: impl AsRef<Path>) -> Result<Layout> {
    let base = base.as_ref();
    ensure_dir(base)?;

    let layout = Layout {
        zipped: base.join(ZIPPED_DIR),
        unzipped: base.join(UNZIPPED_DIR),
        csv: base.join(CSV_DIR),
    };
    for dir in [&layout.zipped, &layout.unzipped, &layout.csv] {
        ensure_dir(dir)?;
    }
    Ok(layout)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    info!(dir = %dir.display(), "creating directory");
    fs::create_dir_all(dir).map_err(|e| FarsError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_all_three_dirs() {
        let tmp = tempdir().unwrap();
        let base = tmp.path().join("data");

        let layout = init_layout(&base).unwrap();

        assert_eq!(layout.zipped, base.join("zipped"));
        assert_eq!(layout.unzipped, base.join("unzipped"));
        assert_eq!(layout.csv, base.join("csv"));
        assert!(layout.zipped.is_dir());
        assert!(layout.unzipped.is_dir());
        assert!(layout.csv.is_dir());
    }

    #[test]
    fn rerun_keeps_existing_contents() {
        let tmp = tempdir().unwrap();
        let first = init_layout(tmp.path()).unwrap();
        fs::write(first.zipped.join("FARS2014.zip"), b"keep").unwrap();

        let second = init_layout(tmp.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(second.zipped.join("FARS2014.zip")).unwrap(), b"keep");
    }
}
