use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};
use tracing::{info, warn};
use url::Url;

use crate::category::{CategoryConfig, BASE_URL};
use crate::error::ExtractError;
use crate::extract;
use crate::output;
use crate::record::ExtractionResult;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// The registry rejects unidentified clients, so the session presents a
/// plain browser profile.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// One session per run: cookie jar, pooled connections, browser headers,
/// bounded timeouts. Shared by the listing fetch and the follow-up workers.
pub fn build_client() -> Result<Client, ExtractError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .cookie_store(true)
        .pool_max_idle_per_host(8)
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(ExtractError::Http)
}

/// Statuses worth retrying: rate limiting and transient upstream errors.
fn is_transient(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// GET the listing page, retrying transient statuses with exponential
/// backoff. Anything else non-2xx fails the run; no partial data.
async fn fetch_listing(client: &Client, url: &str) -> Result<String, ExtractError> {
    let mut attempt = 0u32;
    loop {
        let response = client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            return response.text().await.map_err(ExtractError::Http);
        }
        if !is_transient(status) || attempt == MAX_RETRIES {
            return Err(ExtractError::Status(status));
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        attempt += 1;
        warn!(
            "Listing fetch returned {} (attempt {}/{}), backing off {:.1}s",
            status,
            attempt,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }
}

/// Fetch and fully extract one category.
///
/// Phases: listing fetch → column resolution → row extraction → concurrent
/// truncation follow-ups → blank-row discard. With `save` set, the JSON
/// artifact is written before returning so the freshness gate can find it.
pub async fn extract_category(
    cfg: &'static CategoryConfig,
    save: bool,
    dir: &Path,
) -> Result<ExtractionResult, ExtractError> {
    let client = build_client()?;
    let url = cfg.list_url();
    info!("Fetching {} listing: {}", cfg.label, url);

    let body = fetch_listing(&client, &url).await?;
    let (mut records, deferred) = extract::extract_document(&body, cfg)?;
    info!(
        "{}: {} rows, {} truncated cells to expand",
        cfg.name,
        records.len(),
        deferred.len()
    );

    let base = Url::parse(BASE_URL).expect("base url is well-formed");
    let expanded = extract::fulltext::resolve_all(&client, &base, deferred, &mut records).await;
    if expanded > 0 {
        info!("Expanded {} truncated cells", expanded);
    }

    let records = extract::discard_blank_rows(records);
    let result = ExtractionResult::new(cfg, records);
    info!("{}: extracted {} records", cfg.name, result.records.len());

    if save && !result.records.is_empty() {
        let path = output::write_json(&result, dir)?;
        info!("Saved {}", path.display());
    }

    Ok(result)
}

// ── Tests ──
