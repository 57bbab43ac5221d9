//! Remote feed fetching and parsing.
//!
//! The remote catalog is a LotroInterface favourites feed: one XML document
//! per add-on kind listing `<Ui>` entries with their download URLs.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::DateTime;
use tracing::{debug, info, warn};

use super::types::{AddonError, AddonRecord};
use super::xml::parse_document;

/// Chunk size for streamed downloads.
const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Source of feed documents and add-on archives.
pub trait FeedFetcher {
    /// Downloads a feed document.
    fn fetch_feed(&self, url: &str) -> Result<Vec<u8>, AddonError>;

    /// Downloads `url` to `dest`, reporting progress as a fraction in `0.0..=1.0`.
    fn fetch_file(
        &self,
        url: &str,
        dest: &Path,
        on_progress: &mut dyn FnMut(f32),
    ) -> Result<(), AddonError>;
}

/// Blocking HTTP(S) fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Creates a new fetcher.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("onelauncher-addons/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self { client }
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, AddonError> {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(AddonError::NetworkError(format!(
                "Refusing to fetch non-HTTP URL: {url}"
            )));
        }

        debug!("[ADDON-FEED] GET {}", url);
        let start = Instant::now();

        let response = self.client.get(url).send().map_err(|e| {
            warn!("[ADDON-FEED] HTTP request failed: {}", e);
            AddonError::NetworkError(e.to_string())
        })?;

        let status = response.status();
        debug!("[ADDON-FEED] Response: {} in {:?}", status, start.elapsed());

        if !status.is_success() {
            warn!("[ADDON-FEED] Failed to fetch {}: {}", url, status);
            return Err(AddonError::NetworkError(format!(
                "Failed to fetch {url}: {status}"
            )));
        }
        Ok(response)
    }
}

impl FeedFetcher for HttpFetcher {
    fn fetch_feed(&self, url: &str) -> Result<Vec<u8>, AddonError> {
        let bytes = self
            .get(url)?
            .bytes()
            .map_err(|e| AddonError::NetworkError(format!("Failed to read feed: {e}")))?;
        info!("[ADDON-FEED] Downloaded feed {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }

    fn fetch_file(
        &self,
        url: &str,
        dest: &Path,
        on_progress: &mut dyn FnMut(f32),
    ) -> Result<(), AddonError> {
        let mut response = self.get(url)?;
        let total = response.content_length().filter(|len| *len > 0);

        let mut file = File::create(dest)?;
        let mut buffer = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        let mut received: u64 = 0;

        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|e| AddonError::NetworkError(format!("Download interrupted: {e}")))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])?;
            received += read as u64;
            if let Some(total) = total {
                on_progress((received as f64 / total as f64).min(1.0) as f32);
            }
        }
        file.flush()?;
        on_progress(1.0);

        info!("[ADDON-FEED] Downloaded {} ({} bytes)", url, received);
        Ok(())
    }
}

/// Parses a favourites feed into remote records.
///
/// Entries without an identity are skipped.
pub fn parse_feed(document: &[u8], source: &str) -> Result<Vec<AddonRecord>, AddonError> {
    let text = String::from_utf8_lossy(document);
    let root = parse_document(&text).map_err(|reason| AddonError::MalformedManifest {
        source_name: source.to_string(),
        reason,
    })?;

    let mut records = Vec::new();
    for entry in root.find_all("Ui") {
        let field = |name: &str| entry.child_text(name).unwrap_or_default().to_string();

        let record = AddonRecord {
            id: field("UID"),
            name: sanitize_name(&field("UIName")),
            category: field("UICategory"),
            version: field("UIVersion"),
            author: field("UIAuthorName"),
            latest_release: format_release_date(&field("UIUpdated")),
            file: field("UIFileURL"),
            ..AddonRecord::default()
        };
        if !record.is_managed() {
            debug!("[ADDON-FEED] Skipping entry without UID in {}", source);
            continue;
        }
        records.push(record);
    }

    debug!("[ADDON-FEED] Parsed {} entries from {}", records.len(), source);
    Ok(records)
}

/// Path separators in names would end up in manifest file names.
fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], "-")
}

/// Renders a Unix timestamp as `%Y-%m-%d` (UTC). Unparseable values become
/// empty.
fn format_release_date(seconds: &str) -> String {
    seconds
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
