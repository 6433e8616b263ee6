use std::sync::Arc;
use std::time::Duration;

use html_escape::decode_html_entities;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use super::rows::Deferred;
use crate::record::RowRecord;

/// Follow-up requests run concurrently, but only this many at once.
const CONCURRENCY: usize = 4;
/// One slow dialog fetch must not stall the run; timed-out requests fail
/// soft and the field keeps its placeholder.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// The dialog endpoint returns HTML-entity-encoded JSON:
/// `{"success":true,"textCont":"..."}`.
#[derive(Deserialize)]
struct FulltextPayload {
    #[serde(default)]
    success: bool,
    #[serde(rename = "textCont")]
    text_cont: Option<String>,
}

struct ResolvedCell {
    field: usize,
    row: usize,
    text: Option<String>,
}

/// Resolve every deferred follow-up and write the results back into the
/// provisional records.
///
/// Requests fan out over a bounded worker pool; results stream back over a
/// channel and land via explicit (row, field) addressing, so completion
/// order is irrelevant. Returns the number of cells actually expanded.
pub async fn resolve_all(
    client: &Client,
    base: &Url,
    deferred: Vec<Deferred>,
    records: &mut [RowRecord],
) -> usize {
    if deferred.is_empty() {
        return 0;
    }

    let total = deferred.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<ResolvedCell>(CONCURRENCY * 2);

    for d in deferred {
        let url = match base.join(&d.url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping malformed follow-up URL {}: {}", d.url, e);
                pb.inc(1);
                continue;
            }
        };
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            let text = fetch_fulltext(&client, url).await;
            let _ = tx
                .send(ResolvedCell {
                    field: d.field,
                    row: d.row,
                    text,
                })
                .await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish.
    drop(tx);

    let mut expanded = 0usize;
    while let Some(cell) = rx.recv().await {
        pb.inc(1);
        if let Some(text) = cell.text {
            if apply(records, cell.row, cell.field, text) {
                expanded += 1;
            }
        }
    }

    pb.finish_and_clear();
    expanded
}

/// Write one resolved value back to its owning row. Out-of-range row indices
/// are dropped rather than misfiled into another record.
pub fn apply(records: &mut [RowRecord], row: usize, field: usize, text: String) -> bool {
    match records.get_mut(row) {
        Some(record) => {
            record.set(field, text);
            true
        }
        None => {
            warn!("Dropping fulltext result for out-of-range row {}", row);
            false
        }
    }
}

async fn fetch_fulltext(client: &Client, url: Url) -> Option<String> {
    debug!("Fetching full content from {}", url);
    let response = match tokio::time::timeout(REQUEST_TIMEOUT, client.get(url.clone()).send()).await
    {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            warn!("Fulltext fetch {} failed: {}", url, e);
            return None;
        }
        Err(_) => {
            warn!("Fulltext fetch {} timed out", url);
            return None;
        }
    };

    if !response.status().is_success() {
        warn!("Fulltext fetch {} returned {}", url, response.status());
        return None;
    }

    match response.text().await {
        Ok(body) => decode_body(&body),
        Err(e) => {
            warn!("Fulltext fetch {} body read failed: {}", url, e);
            None
        }
    }
}

/// Decode one follow-up response body into the expanded cell text.
///
/// Entities are decoded before the JSON parse because the endpoint escapes
/// the whole payload (`&quot;success&quot;:true`). A body that is not JSON
/// at all falls back to plain HTML extraction of the dialog markup.
pub fn decode_body(body: &str) -> Option<String> {
    let decoded = decode_html_entities(body);
    match serde_json::from_str::<FulltextPayload>(&decoded) {
        Ok(payload) if payload.success => payload.text_cont.map(|c| sanitize(&c)),
        Ok(_) => {
            debug!("Fulltext payload had no success/textCont");
            None
        }
        Err(_) => dialog_text(body),
    }
}

/// Flatten dialog content to comma-delimited plain text: line breaks become
/// `, `, remaining markup is stripped, duplicate and trailing delimiters are
/// collapsed away.
pub fn sanitize(content: &str) -> String {
    let br = Regex::new(r"(?i)<br\s*/?>").expect("br pattern");
    let tag = Regex::new(r"<[^>]+>").expect("tag pattern");
    let dup = Regex::new(r",\s*,").expect("dup pattern");

    let text = br.replace_all(content, ", ");
    let text = tag.replace_all(&text, "");
    let mut text = text.replace("\\n", ", ").replace('\n', ", ");
    while dup.is_match(&text) {
        text = dup.replace_all(&text, ",").into_owned();
    }
    let text = text.trim();
    let text = text.strip_suffix(',').unwrap_or(text);
    text.trim().to_string()
}

/// Fallback for non-JSON responses: text of the dialog body, or the whole
/// document when the dialog container is absent.
fn dialog_text(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let modal_sel = Selector::parse("div.modal-body").expect("modal selector");
    let text: String = match doc.select(&modal_sel).next() {
        Some(modal) => modal.text().collect(),
        None => doc.root_element().text().collect(),
    };
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryConfig;

    #[test]
    fn sanitize_normalizes_breaks_and_newlines() {
        assert_eq!(sanitize("A<br>B\nC"), "A, B, C");
        assert_eq!(sanitize("A<br/>B<BR >C"), "A, B, C");
        assert_eq!(sanitize("A\\nB"), "A, B");
    }

    #[test]
    fn sanitize_strips_markup_and_collapses_delimiters() {
        assert_eq!(sanitize("<p>Cili</p><br>Tomato<br>"), "Cili, Tomato");
        assert_eq!(sanitize("A\n\n\nB"), "A, B");
        assert_eq!(sanitize("A<br><br>B,"), "A, B");
        assert_eq!(sanitize("  A  "), "A");
    }

    #[test]
    fn decode_body_parses_entity_encoded_json() {
        let body = "{&quot;success&quot;:true,&quot;textCont&quot;:&quot;A&lt;br&gt;B\\nC&quot;}";
        assert_eq!(decode_body(body).as_deref(), Some("A, B, C"));
    }

    #[test]
    fn decode_body_parses_plain_json() {
        let body = r#"{"success":true,"textCont":"Cili<br>Padi"}"#;
        assert_eq!(decode_body(body).as_deref(), Some("Cili, Padi"));
    }

    #[test]
    fn decode_body_rejects_unsuccessful_payload() {
        let body = r#"{"success":false,"textCont":"nope"}"#;
        assert_eq!(decode_body(body), None);
    }

    #[test]
    fn decode_body_falls_back_to_dialog_markup() {
        let body = r#"<html><body>
            <div class="modal-body">Cili Padi Tomato</div>
        </body></html>"#;
        assert_eq!(decode_body(body).as_deref(), Some("Cili Padi Tomato"));
    }

    #[test]
    fn decode_body_falls_back_to_whole_document_text() {
        let body = "<html><body><p>Bare dialog</p></body></html>";
        assert_eq!(decode_body(body).as_deref(), Some("Bare dialog"));
    }

    #[test]
    fn apply_addresses_rows_explicitly() {
        let cfg = CategoryConfig::parse("tanaman").unwrap();
        let field = cfg.field_index("jenis_tanaman").unwrap();
        let mut records = vec![RowRecord::blank(cfg), RowRecord::blank(cfg)];

        // Results arriving in reverse order still land on their own rows.
        assert!(apply(&mut records, 1, field, "row one content".into()));
        assert!(apply(&mut records, 0, field, "row zero content".into()));
        assert_eq!(records[0].get(field), "row zero content");
        assert_eq!(records[1].get(field), "row one content");
    }

    #[test]
    fn apply_drops_out_of_range_rows() {
        let cfg = CategoryConfig::parse("tanaman").unwrap();
        let mut records = vec![RowRecord::blank(cfg)];
        assert!(!apply(&mut records, 5, 0, "lost".into()));
        assert!(records[0].is_blank());
    }
}
