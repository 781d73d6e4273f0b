// src/process/convert.rs
use dbase::FieldValue;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

use crate::error::{ConversionError, FarsError, Result};
use crate::history::pending_years;
use crate::process::matching_files;
use crate::year::Year;

/// Tally of one conversion pass.
#[derive(Debug, Default)]
pub struct ConversionSummary {
    /// CSV files written by this pass.
    pub written: Vec<PathBuf>,
    /// CSV files left alone because they already existed.
    pub skipped: Vec<PathBuf>,
    /// Tables that could not be converted, tagged with their year.
    pub failed: Vec<(String, ConversionError)>,
}

/// Converts the extracted DBF tables of each selected year to CSV under
/// `csv_dir/<year>/`.
///
/// With `years` unset, the selection is every year directory in
/// `unzipped_dir` that has no counterpart in `csv_dir`. A table whose CSV
/// already exists is skipped unless `overwrite` is set. A table that fails
/// to convert is logged and recorded; the pass carries on with the rest.
#[instrument(level = "info", skip(unzipped_dir, csv_dir, years), fields(src = %unzipped_dir.as_ref().display()))]
pub fn convert_tables(
    unzipped_dir: impl AsRef<Path>,
    csv_dir: impl AsRef<Path>,
    years: Option<&[Year]>,
    overwrite: bool,
) -> Result<ConversionSummary> {
    let unzipped_dir = unzipped_dir.as_ref();
    let csv_dir = csv_dir.as_ref();

    let selected: Vec<String> = match years {
        Some(ys) => ys.iter().map(Year::to_string).collect(),
        None => pending_years(unzipped_dir, csv_dir)?,
    };

    let mut summary = ConversionSummary::default();
    for year in selected {
        let origin_dir = unzipped_dir.join(&year);
        if !origin_dir.is_dir() {
            let err = ConversionError::MissingYear {
                year: year.clone(),
                dir: origin_dir,
            };
            warn!(%year, kind = err.kind(), error = %err, "nothing to convert");
            summary.failed.push((year, err));
            continue;
        }

        let destination_dir = csv_dir.join(&year);
        fs::create_dir_all(&destination_dir).map_err(|e| FarsError::io(&destination_dir, e))?;

        for table in matching_files(&origin_dir, "*.dbf")? {
            let Some(file_name) = table.file_name() else {
                continue;
            };
            let destination = destination_dir.join(Path::new(file_name).with_extension("csv"));
            if destination.exists() && !overwrite {
                summary.skipped.push(destination);
                continue;
            }

            info!(%year, file = %file_name.to_string_lossy(), "converting");
            match export_table(&table, &destination) {
                Ok(rows) => {
                    info!(%year, file = %destination.display(), rows, "wrote csv");
                    summary.written.push(destination);
                }
                Err(err) => {
                    warn!(
                        %year,
                        file = %file_name.to_string_lossy(),
                        kind = err.kind(),
                        error = %err,
                        "conversion failed; continuing"
                    );
                    summary.failed.push((year.clone(), err));
                }
            }
        }
    }

    Ok(summary)
}

/// Writes `table` as CSV to `destination`: a header row of field names,
/// then one row per record in field order. Returns the number of records.
///
/// The output is staged in `<destination>.part` and only renamed into place
/// once complete.
pub fn export_table(table: &Path, destination: &Path) -> std::result::Result<usize, ConversionError> {
    let mut part = destination.as_os_str().to_os_string();
    part.push(".part");
    let part = PathBuf::from(part);

    let result = write_csv(table, &part).and_then(|rows| {
        fs::rename(&part, destination).map_err(|source| ConversionError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
        Ok(rows)
    });
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn write_csv(table: &Path, out: &Path) -> std::result::Result<usize, ConversionError> {
    let mut reader = dbase::Reader::from_path(table).map_err(|source| ConversionError::Open {
        path: table.to_path_buf(),
        source,
    })?;
    let names: Vec<String> = reader.fields().iter().map(|f| f.name().to_string()).collect();

    let write_err = |source| ConversionError::Write {
        path: out.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(out).map_err(write_err)?;
    writer.write_record(&names).map_err(write_err)?;

    let mut rows = 0;
    for (index, record) in reader.iter_records().enumerate() {
        let record = record.map_err(|source| ConversionError::Record {
            path: table.to_path_buf(),
            index,
            source,
        })?;
        let row: Vec<String> = names
            .iter()
            .map(|name| record.get(name).map(render_value).unwrap_or_default())
            .collect();
        writer.write_record(&row).map_err(write_err)?;
        rows += 1;
    }
    writer.flush().map_err(|source| ConversionError::Io {
        path: out.to_path_buf(),
        source,
    })?;
    Ok(rows)
}

#[allow(unreachable_patterns)]
fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Character(v) => v.clone().unwrap_or_default(),
        FieldValue::Memo(v) => v.clone(),
        FieldValue::Numeric(v) => v.map(|n| n.to_string()).unwrap_or_default(),
        FieldValue::Float(v) => v.map(|n| n.to_string()).unwrap_or_default(),
        FieldValue::Logical(v) => v.map(|b| b.to_string()).unwrap_or_default(),
        FieldValue::Integer(v) => v.to_string(),
        FieldValue::Double(v) => v.to_string(),
        FieldValue::Currency(v) => v.to_string(),
        FieldValue::Date(v) => v
            .as_ref()
            .map(|d| format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
            .unwrap_or_default(),
        FieldValue::DateTime(dt) => {
            let (d, t) = (dt.date(), dt.time());
            format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                d.year(),
                d.month(),
                d.day(),
                t.hours(),
                t.minutes(),
                t.seconds()
            )
        }
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::init_tracing;
    use tempfile::tempdir;

    /// A minimal dBase III table: `NAME` C(5) and `AGE` N(3,0).
    fn dbf_bytes(rows: &[(&str, &str)]) -> Vec<u8> {
        let fields: [(&str, u8, u8); 2] = [("NAME", b'C', 5), ("AGE", b'N', 3)];
        let header_len = 32 + 32 * fields.len() + 1;
        let record_len = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();

        let mut buf = vec![0x03, 124, 1, 1];
        buf.extend_from_slice(&(rows.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(header_len as u16).to_le_bytes());
        buf.extend_from_slice(&(record_len as u16).to_le_bytes());
        buf.extend_from_slice(&[0u8; 20]);
        for (name, kind, len) in fields {
            let mut desc = [0u8; 32];
            desc[..name.len()].copy_from_slice(name.as_bytes());
            desc[11] = kind;
            desc[16] = len;
            buf.extend_from_slice(&desc);
        }
        buf.push(0x0D);
        for (name, age) in rows {
            buf.push(b' ');
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(age.as_bytes());
        }
        buf.push(0x1A);
        buf
    }

    const GOOD_CSV: &str = "NAME,AGE\nAlice,42\nBobby,101\n";

    fn good_table() -> Vec<u8> {
        dbf_bytes(&[("Alice", "042"), ("Bobby", "101")])
    }

    #[test]
    fn exports_header_and_rows() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let table = tmp.path().join("PERSON.DBF");
        fs::write(&table, good_table()).unwrap();
        let out = tmp.path().join("PERSON.csv");

        let rows = export_table(&table, &out).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(fs::read_to_string(&out).unwrap(), GOOD_CSV);
        assert!(!tmp.path().join("PERSON.csv.part").exists());
    }

    #[test]
    fn converts_pending_years_into_csv_dirs() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let unzipped = tmp.path().join("unzipped");
        let csv_dir = tmp.path().join("csv");
        fs::create_dir_all(unzipped.join("2014")).unwrap();
        fs::create_dir_all(&csv_dir).unwrap();
        fs::write(unzipped.join("2014/ACCIDENT.DBF"), good_table()).unwrap();
        fs::write(unzipped.join("2014/readme.txt"), b"ignored").unwrap();

        let summary = convert_tables(&unzipped, &csv_dir, None, false).unwrap();

        assert_eq!(summary.written, vec![csv_dir.join("2014/ACCIDENT.csv")]);
        assert!(summary.failed.is_empty());
        assert_eq!(
            fs::read_to_string(csv_dir.join("2014/ACCIDENT.csv")).unwrap(),
            GOOD_CSV
        );
        assert!(!csv_dir.join("2014/readme.csv").exists());
    }

    #[test]
    fn existing_output_is_left_alone_without_overwrite() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let unzipped = tmp.path().join("unzipped");
        let csv_dir = tmp.path().join("csv");
        fs::create_dir_all(unzipped.join("2014")).unwrap();
        fs::create_dir_all(csv_dir.join("2014")).unwrap();
        fs::write(unzipped.join("2014/ACCIDENT.DBF"), good_table()).unwrap();
        fs::write(csv_dir.join("2014/ACCIDENT.csv"), "sentinel").unwrap();

        let years = [Year(2014)];
        let summary = convert_tables(&unzipped, &csv_dir, Some(&years), false).unwrap();

        assert!(summary.written.is_empty());
        assert_eq!(summary.skipped, vec![csv_dir.join("2014/ACCIDENT.csv")]);
        assert_eq!(
            fs::read_to_string(csv_dir.join("2014/ACCIDENT.csv")).unwrap(),
            "sentinel"
        );

        let summary = convert_tables(&unzipped, &csv_dir, Some(&years), true).unwrap();

        assert_eq!(summary.written.len(), 1);
        assert_eq!(
            fs::read_to_string(csv_dir.join("2014/ACCIDENT.csv")).unwrap(),
            GOOD_CSV
        );
    }

    #[test]
    fn bad_table_does_not_stop_the_batch() {
        init_tracing();
        // corrupt table sorted both before and after the good one
        for (bad, good) in [("A_BAD.DBF", "B_GOOD.DBF"), ("Z_BAD.DBF", "B_GOOD.DBF")] {
            let tmp = tempdir().unwrap();
            let unzipped = tmp.path().join("unzipped");
            let csv_dir = tmp.path().join("csv");
            fs::create_dir_all(unzipped.join("2010")).unwrap();
            fs::create_dir_all(&csv_dir).unwrap();
            fs::write(unzipped.join("2010").join(bad), b"this is not a table").unwrap();
            fs::write(unzipped.join("2010").join(good), good_table()).unwrap();

            let summary = convert_tables(&unzipped, &csv_dir, None, false).unwrap();

            assert_eq!(summary.written, vec![csv_dir.join("2010/B_GOOD.csv")]);
            assert_eq!(summary.failed.len(), 1);
            assert_eq!(summary.failed[0].0, "2010");
            assert!(matches!(summary.failed[0].1, ConversionError::Open { .. }));
            assert_eq!(
                fs::read_to_string(csv_dir.join("2010/B_GOOD.csv")).unwrap(),
                GOOD_CSV
            );
            let bad_csv = csv_dir.join("2010").join(Path::new(bad).with_extension("csv"));
            assert!(!bad_csv.exists());
        }
    }

    #[test]
    fn missing_explicit_year_is_reported_not_fatal() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let unzipped = tmp.path().join("unzipped");
        let csv_dir = tmp.path().join("csv");
        fs::create_dir_all(unzipped.join("2011")).unwrap();
        fs::create_dir_all(&csv_dir).unwrap();
        fs::write(unzipped.join("2011/PERSON.DBF"), good_table()).unwrap();

        let years = [Year(2009), Year(2011)];
        let summary = convert_tables(&unzipped, &csv_dir, Some(&years), false).unwrap();

        assert_eq!(summary.written, vec![csv_dir.join("2011/PERSON.csv")]);
        assert_eq!(summary.failed.len(), 1);
        assert!(matches!(summary.failed[0].1, ConversionError::MissingYear { .. }));
        assert!(!csv_dir.join("2009").exists());
    }
}
