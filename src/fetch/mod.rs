// src/fetch/mod.rs
use reqwest::Client;
use std::{path::Path, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::{FailurePolicy, DEFAULT_REMOTE_URL};
use crate::error::{FarsError, Result};
use crate::process::StageReport;
use crate::year::Year;

pub mod listing;
pub mod zips;

pub use listing::find_archive_name;

/// Upper bound on a single retry delay.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Where the per-year listings live and how hard to try reading them.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    /// Directory URL with a `{year}` placeholder.
    pub url_template: String,
    pub retries: u32,
    pub backoff_ms: u64,
    /// Whole-request budget for a listing. Archive downloads are bounded only
    /// by the client's connect timeout.
    pub listing_timeout: Duration,
}

impl Default for RemoteSource {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_REMOTE_URL.to_string(),
            retries: 2,
            backoff_ms: 500,
            listing_timeout: Duration::from_secs(60),
        }
    }
}

impl RemoteSource {
    /// The listing directory for `year`, always with a trailing slash so
    /// file names join beneath it.
    pub fn dir_url(&self, year: Year) -> Result<Url> {
        let mut raw = self.url_template.replace("{year}", &year.to_string());
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|source| FarsError::Url { url: raw, source })
    }

    /// Delay before retry number `attempt` (1-based): `backoff_ms` doubled
    /// per attempt, capped at `MAX_BACKOFF_MS`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
    }
}

async fn get_listing(client: &Client, url: &Url, timeout: Duration) -> reqwest::Result<String> {
    debug!(%url, "fetching listing");
    client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

async fn get_listing_with_retry(
    client: &Client,
    source: &RemoteSource,
    year: Year,
    url: &Url,
) -> Result<String> {
    let mut attempts = 0;
    loop {
        match get_listing(client, url, source.listing_timeout).await {
            Ok(text) => return Ok(text),
            Err(e) if attempts < source.retries => {
                attempts += 1;
                let backoff = source.backoff(attempts);
                warn!(%url, %year, attempt = attempts, delay_ms = backoff.as_millis() as u64, error = %e, "retrying listing");
                sleep(backoff).await;
            }
            Err(e) => {
                return Err(FarsError::Listing {
                    year,
                    url: url.to_string(),
                    source: e,
                })
            }
        }
    }
}

/// Resolves the archive name for one year and downloads it unless it is
/// already in `zipped_dir`. Returns the name when it was (or, in preview,
/// would be) downloaded and `None` when it was already present.
async fn fetch_year(
    client: &Client,
    source: &RemoteSource,
    zipped_dir: &Path,
    year: Year,
    preview: bool,
) -> Result<Option<String>> {
    let dir_url = source.dir_url(year)?;
    let listing = get_listing_with_retry(client, source, year, &dir_url).await?;
    let filename = find_archive_name(&listing).ok_or_else(|| FarsError::NotFound {
        year,
        url: dir_url.to_string(),
    })?;

    if zipped_dir.join(&filename).is_file() {
        debug!(%year, file = %filename, "already downloaded");
        return Ok(None);
    }
    if preview {
        info!(%year, file = %filename, "would download");
        return Ok(Some(filename));
    }

    let file_url = dir_url.join(&filename).map_err(|source| FarsError::Url {
        url: format!("{}{}", dir_url, filename),
        source,
    })?;
    info!(%year, file = %filename, "downloading");
    zips::download_zip(client, year, &file_url, zipped_dir, &filename).await?;
    Ok(Some(filename))
}

/// Fetches the archive for each of `years` into `zipped_dir`.
///
/// Archives already on disk are skipped. With `preview` set nothing is
/// written; the report lists what would have been downloaded.
#[instrument(level = "info", skip(client, source, zipped_dir, years), fields(dir = %zipped_dir.as_ref().display()))]
pub async fn fetch_archives(
    client: &Client,
    source: &RemoteSource,
    zipped_dir: impl AsRef<Path>,
    years: &[Year],
    preview: bool,
    policy: FailurePolicy,
) -> Result<StageReport<String>> {
    let zipped_dir = zipped_dir.as_ref();
    let mut report = StageReport::default();

    for &year in years {
        match fetch_year(client, source, zipped_dir, year, preview).await {
            Ok(Some(filename)) => report.completed.push(filename),
            Ok(None) => {}
            Err(e) => match policy {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::Continue => {
                    error!(%year, error = %e, "fetch failed");
                    report.failures.push(e);
                }
            },
        }
    }

    Ok(report)
}
