use anyhow::{Context, Result};
use farsgrab::{fetch, layout, process, Config};
use reqwest::Client;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    let config = Config::load().context("loading configuration")?;
    let start = Instant::now();

    // ─── 2) working directories ──────────────────────────────────────
    let dirs = layout::init_layout(&config.data_dir)?;

    // ─── 3) fetch archives ───────────────────────────────────────────
    let client = Client::builder()
        .connect_timeout(config.timeout())
        .build()
        .context("building HTTP client")?;
    let fetched = fetch::fetch_archives(
        &client,
        &config.remote_source(),
        &dirs.zipped,
        &config.years,
        config.preview,
        config.on_failure,
    )
    .await?;

    if config.preview {
        info!(files = ?fetched.completed, "preview only; would download");
        return Ok(());
    }
    info!(count = fetched.completed.len(), "archives downloaded");

    // ─── 4) extract ──────────────────────────────────────────────────
    let extracted = tokio::task::spawn_blocking({
        let zipped = dirs.zipped.clone();
        let unzipped = dirs.unzipped.clone();
        let policy = config.on_failure;
        move || process::extract_archives(&zipped, &unzipped, policy)
    })
    .await??;
    info!(years = ?extracted.completed, "archives extracted");

    // ─── 5) convert ──────────────────────────────────────────────────
    let summary = tokio::task::spawn_blocking({
        let unzipped = dirs.unzipped.clone();
        let csv = dirs.csv.clone();
        let years = config.convert_years.clone();
        let overwrite = config.overwrite;
        move || process::convert_tables(&unzipped, &csv, years.as_deref(), overwrite)
    })
    .await??;

    info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        elapsed = ?start.elapsed(),
        "all done"
    );
    let stage_failures = fetched.failures.len() + extracted.failures.len();
    if stage_failures > 0 {
        warn!(count = stage_failures, "some years were not fetched or extracted");
    }
    Ok(())
}
