use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};

use crate::fetch::RemoteSource;
use crate::year::{parse_years, Year};

/// HTTPS mirror of the per-year DBF directories.
pub const DEFAULT_REMOTE_URL: &str = "https://static.nhtsa.gov/nhtsa/downloads/FARS/{year}/National/";

/// What a stage does when one year's fetch or extraction fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the stage on the first failure.
    #[default]
    Abort,
    /// Record the failure and move on to the next year.
    Continue,
}

impl FailurePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Some(FailurePolicy::Abort),
            "continue" => Some(FailurePolicy::Continue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub years: Vec<Year>,
    /// Listing URL with a `{year}` placeholder.
    pub remote_url: String,
    pub preview: bool,
    pub overwrite: bool,
    /// Years to convert; `None` converts whatever is extracted but not yet converted.
    pub convert_years: Option<Vec<Year>>,
    pub on_failure: FailurePolicy,
    pub timeout_secs: u64,
    pub listing_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            years: vec![Year(2013), Year(2014)],
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            preview: false,
            overwrite: false,
            convert_years: None,
            on_failure: FailurePolicy::Abort,
            timeout_secs: 60,
            listing_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl Config {
    /// Defaults, then the YAML file named by `FARS_CONFIG`, then `FARS_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match env::var("FARS_CONFIG") {
            Ok(path) => {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {}", path))?;
                Self::from_yaml_str(&text).with_context(|| format!("parsing config file {}", path))?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        if config.years.is_empty() {
            bail!("`years` must name at least one year");
        }
        Ok(config)
    }

    /// Applies `FARS_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("FARS_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(years) = lookup("FARS_YEARS") {
            self.years = parse_years(&years).context("FARS_YEARS")?;
        }
        if let Some(url) = lookup("FARS_REMOTE_URL") {
            self.remote_url = url;
        }
        if let Some(v) = lookup("FARS_PREVIEW") {
            self.preview = parse_flag(&v).context("FARS_PREVIEW")?;
        }
        if let Some(v) = lookup("FARS_OVERWRITE") {
            self.overwrite = parse_flag(&v).context("FARS_OVERWRITE")?;
        }
        if let Some(v) = lookup("FARS_ON_FAILURE") {
            self.on_failure = FailurePolicy::from_str(&v)
                .with_context(|| format!("FARS_ON_FAILURE must be abort or continue, got {:?}", v))?;
        }
        if let Some(v) = lookup("FARS_TIMEOUT_SECS") {
            self.timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("FARS_TIMEOUT_SECS: bad number {:?}", v))?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn remote_source(&self) -> RemoteSource {
        RemoteSource {
            url_template: self.remote_url.clone(),
            retries: self.listing_retries,
            backoff_ms: self.retry_backoff_ms,
            listing_timeout: self.timeout(),
        }
    }
}

fn parse_flag(v: &str) -> Result<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let config = Config::from_yaml_str(
            "data_dir: /tmp/fars\nyears: [1999, 2000]\non_failure: continue\n",
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/fars"));
        assert_eq!(config.years, vec![Year(1999), Year(2000)]);
        assert_eq!(config.on_failure, FailurePolicy::Continue);
        assert_eq!(config.remote_url, DEFAULT_REMOTE_URL);
        assert!(!config.overwrite);
        assert_eq!(config.convert_years, None);
    }

    #[test]
    fn empty_year_list_is_rejected() {
        assert!(Config::from_yaml_str("years: []\n").is_err());
    }

    #[test]
    fn env_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("FARS_YEARS", "2004-2006"),
            ("FARS_PREVIEW", "true"),
            ("FARS_ON_FAILURE", "Continue"),
            ("FARS_TIMEOUT_SECS", "5"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.years, vec![Year(2004), Year(2005), Year(2006)]);
        assert!(config.preview);
        assert_eq!(config.on_failure, FailurePolicy::Continue);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut config = Config::default();
        let err = config.apply_overrides(|k| (k == "FARS_ON_FAILURE").then(|| "skip".to_string()));
        assert!(err.is_err());
    }
}
