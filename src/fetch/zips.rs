use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use url::Url;

use crate::error::{FarsError, Result};
use crate::year::Year;

/// Download `url` into `dest_dir/filename`. The body lands in a `.part`
/// file first and is renamed once fully written.
/// Returns the full path of the saved file.
pub async fn download_zip(
    client: &Client,
    year: Year,
    url: &Url,
    dest_dir: impl AsRef<Path>,
    filename: &str,
) -> Result<PathBuf> {
    let dest_path = dest_dir.as_ref().join(filename);
    let part_path = dest_dir.as_ref().join(format!("{}.part", filename));

    let transfer = |source| FarsError::Transfer {
        year,
        url: url.to_string(),
        source,
    };
    let resp = client
        .get(url.as_str())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(transfer)?;
    let bytes = resp.bytes().await.map_err(transfer)?;

    let stored = match fs::write(&part_path, &bytes).await {
        Ok(()) => fs::rename(&part_path, &dest_path)
            .await
            .map_err(|e| FarsError::io(&dest_path, e)),
        Err(e) => Err(FarsError::io(&part_path, e)),
    };
    if stored.is_err() {
        let _ = fs::remove_file(&part_path).await;
    }
    stored.map(|()| dest_path)
}
