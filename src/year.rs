use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("digit run pattern"));

/// A four-digit data year, e.g. `2014`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct Year(pub u32);

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Infers the data year from a file name such as `FARS00.dbf`,
/// `FARSDBF97.dbf` or `FARS1991.zip`.
///
/// The first run of ASCII digits is taken as the year. Values 0..=74 land in
/// the 2000s and 75..=99 in the 1900s; anything larger passes through as a
/// literal year. Returns `None` when the name has no digits or the run does
/// not fit in a `u32`.
pub fn infer_year(filename: &str) -> Option<Year> {
    let run = DIGIT_RUN.find(filename)?;
    let value: u32 = run.as_str().parse().ok()?;
    let year = match value {
        0..=74 => 2000 + value,
        75..=99 => 1900 + value,
        _ => value,
    };
    Some(Year(year))
}

/// Parses a year list such as `2013,2014`, `2004-2014` or a mix
/// (`1999,2004-2006`). Ranges are inclusive.
pub fn parse_years(list: &str) -> Result<Vec<Year>> {
    let mut years = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start
                    .trim()
                    .parse()
                    .with_context(|| format!("bad range start in {:?}", part))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .with_context(|| format!("bad range end in {:?}", part))?;
                if end < start {
                    bail!("year range {:?} runs backwards", part);
                }
                years.extend((start..=end).map(Year));
            }
            None => {
                let y: u32 = part
                    .parse()
                    .with_context(|| format!("bad year {:?}", part))?;
                years.push(Year(y));
            }
        }
    }
    if years.is_empty() {
        bail!("no years in {:?}", list);
    }
    Ok(years)
}
