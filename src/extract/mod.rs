pub mod columns;
pub mod fulltext;
pub mod rows;

use scraper::Html;

use crate::category::CategoryConfig;
use crate::error::ExtractError;
use crate::record::RowRecord;
use rows::Deferred;

/// Parse one listing document into provisional records plus the deferred
/// follow-ups needed to expand truncated cells. Pure: no network, so the
/// whole table pipeline is testable against inline fixtures.
pub fn extract_document(
    html: &str,
    cfg: &CategoryConfig,
) -> Result<(Vec<RowRecord>, Vec<Deferred>), ExtractError> {
    let doc = Html::parse_document(html);
    let resolved = columns::resolve(&doc, cfg)?;
    Ok(rows::extract(&resolved, cfg))
}

/// Drop records that carry no data at all. Runs after truncation resolution,
/// as the last pipeline step, so deferred row indices stay valid and a row
/// that only gains content through a follow-up survives the filter.
pub fn discard_blank_rows(records: Vec<RowRecord>) -> Vec<RowRecord> {
    records.into_iter().filter(|r| !r.is_blank()).collect()
}

// ── Tests ──
