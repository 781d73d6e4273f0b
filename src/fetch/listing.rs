// src/fetch/listing.rs
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// `FARS…zip`, case-insensitive, never crossing a path or markup boundary.
static ARCHIVE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)FARS[^\s/\\"'<>]*?\.zip"#).expect("archive name pattern"));

/// Picks the archive file name out of a directory listing.
///
/// HTML listings are read through their anchors and the last path segment of
/// each `href` is matched; anything else (FTP-style text listings, or HTML
/// without a matching anchor) is scanned as plain text. When a directory
/// carries several bundles (`…CSV.zip`, `…DBF.zip`, `…SAS.zip`) the first
/// name mentioning DBF is taken; otherwise the first match wins.
pub fn find_archive_name(listing: &str) -> Option<String> {
    let mut candidates = if looks_like_html(listing) {
        matching_hrefs(listing)
    } else {
        Vec::new()
    };
    if candidates.is_empty() {
        candidates = ARCHIVE_NAME
            .find_iter(listing)
            .map(|m| m.as_str().to_string())
            .collect();
    }
    prefer_dbf(candidates)
}

fn prefer_dbf(candidates: Vec<String>) -> Option<String> {
    let dbf = candidates
        .iter()
        .position(|name| name.to_ascii_lowercase().contains("dbf"));
    candidates.into_iter().nth(dbf.unwrap_or(0))
}

fn looks_like_html(listing: &str) -> bool {
    let head = listing.trim_start();
    head.starts_with('<') || listing.to_ascii_lowercase().contains("<a ")
}

fn matching_hrefs(listing: &str) -> Vec<String> {
    let doc = Html::parse_document(listing);
    let anchors = Selector::parse("a[href]").expect("anchor selector should parse");
    let names: Vec<String> = doc
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let path = href.split(['?', '#']).next().unwrap_or(href);
            path.rsplit('/').next()
        })
        .filter_map(|segment| {
            ARCHIVE_NAME
                .find(segment)
                .filter(|m| m.start() == 0 && m.end() == segment.len())
                .map(|m| m.as_str().to_string())
        })
        .collect();
    names
}
