//! Error types for the download → extract → convert pipeline.
//!
//! `FarsError` is what the fetch and extract stages fail with. Conversion
//! failures are isolated per table file and reported as `ConversionError`.

use std::path::PathBuf;
use thiserror::Error;

use crate::year::Year;

pub type Result<T> = std::result::Result<T, FarsError>;

#[derive(Debug, Error)]
pub enum FarsError {
    /// The year's directory listing did not name any FARS archive.
    #[error("no FARS archive listed for {year} at {url}")]
    NotFound { year: Year, url: String },

    /// The directory listing itself could not be retrieved.
    #[error("listing {url} for {year} failed: {source}")]
    Listing {
        year: Year,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Downloading the archive failed.
    #[error("transfer of {url} for {year} failed: {source}")]
    Transfer {
        year: Year,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Corrupt or unreadable zip archive.
    #[error("archive {} is unreadable: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot infer a year from archive name {name}")]
    NoYear { name: String },

    #[error("invalid remote URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl FarsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FarsError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a single table file could not be converted.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("no extracted tables for year {year} in {}", dir.display())]
    MissingYear { year: String, dir: PathBuf },

    #[error("cannot open table {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: dbase::Error,
    },

    #[error("record {index} of {} is unreadable: {source}", path.display())]
    Record {
        path: PathBuf,
        index: usize,
        #[source]
        source: dbase::Error,
    },

    #[error("writing {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::MissingYear { .. } => "missing_year",
            ConversionError::Open { .. } => "open",
            ConversionError::Record { .. } => "record",
            ConversionError::Write { .. } => "write",
            ConversionError::Io { .. } => "io",
        }
    }
}
