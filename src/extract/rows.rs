use regex::Regex;
use scraper::{ElementRef, Selector};

use super::columns::ResolvedTable;
use crate::category::CategoryConfig;
use crate::record::RowRecord;

/// A truncated cell awaiting expansion: which field of which provisional row,
/// and the follow-up URL that returns the full text.
///
/// `row` indexes the provisional (pre-filter) record vector returned by
/// [`extract`]. Blank-row discarding runs only after all deferred results
/// have been applied, so these indices stay valid for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    pub field: usize,
    pub row: usize,
    pub url: String,
}

/// Walk every row after the header and build one provisional record per row,
/// collecting follow-up requests for truncated cells.
///
/// Rows with no cells at all (spacer rows) are skipped and never indexed.
/// Blank records are kept here; the caller filters them after truncation
/// resolution.
pub fn extract(
    resolved: &ResolvedTable,
    cfg: &CategoryConfig,
) -> (Vec<RowRecord>, Vec<Deferred>) {
    let tr_sel = Selector::parse("tr").expect("tr selector");
    let cell_sel = Selector::parse("th, td").expect("cell selector");

    let mut records: Vec<RowRecord> = Vec::new();
    let mut deferred: Vec<Deferred> = Vec::new();

    for row in resolved.table.select(&tr_sel).skip(resolved.header_row + 1) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.is_empty() {
            continue;
        }

        let mut record = RowRecord::blank(cfg);
        for field in 0..cfg.fields.len() {
            let Some(position) = resolved.columns[field] else {
                continue; // field not in this table, keep the empty sentinel
            };
            let Some(cell) = cells.get(position) else {
                continue; // short row, keep the empty sentinel
            };

            let text = cell_text(cell);
            if is_truncated(&text) {
                // The marker text is never final: either defer to the
                // follow-up URL (cleaned prefix as placeholder) or, with no
                // usable link, settle for the cleaned prefix.
                if let Some(url) = fulltext_query(cell) {
                    deferred.push(Deferred {
                        field,
                        row: records.len(),
                        url,
                    });
                }
                record.set(field, strip_more_suffix(&text));
            } else {
                record.set(field, text);
            }
        }

        records.push(record);
    }

    (records, deferred)
}

/// Rendered cell text with runs of whitespace collapsed to single spaces.
/// Entity decoding already happened during document parsing.
fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The site renders truncated cells as `<prefix>... More ...`.
fn is_truncated(text: &str) -> bool {
    text.contains("More") && text.contains("...")
}

/// Follow-up URL from the cell's "More ..." anchor. The site usually puts
/// the `fulltext.php` query on `data-query` and a javascript stub on `href`,
/// but an anchor carrying the query on `href` works too.
fn fulltext_query(cell: &ElementRef) -> Option<String> {
    let link_sel = Selector::parse("a").expect("link selector");
    for link in cell.select(&link_sel) {
        for attr in ["data-query", "href"] {
            if let Some(url) = link.value().attr(attr) {
                if url.contains("fulltext.php") {
                    return Some(url.to_string());
                }
            }
        }
    }
    None
}

/// Drop the trailing `More ...` marker and any comma it leaves dangling.
/// The marker can appear twice in rendered text (once in the cell, once as
/// the anchor's own label), so the pattern consumes repeats.
fn strip_more_suffix(text: &str) -> String {
    let more = Regex::new(r"(?:More\s*\.+\s*)+$").expect("suffix pattern");
    let cleaned = more.replace(text, "");
    let cleaned = cleaned.trim();
    cleaned.strip_suffix(',').unwrap_or(cleaned).trim().to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::columns;
    use scraper::Html;

    fn cfg() -> &'static CategoryConfig {
        CategoryConfig::parse("tanaman").unwrap()
    }

    fn extract_from(html: &str) -> (Vec<RowRecord>, Vec<Deferred>) {
        let doc = Html::parse_document(html);
        let resolved = columns::resolve(&doc, cfg()).unwrap();
        extract(&resolved, cfg())
    }

    const HEADER: &str = r#"
        <tr>
          <th data-field="no_pensijilan">No</th>
          <th data-field="nama">Nama</th>
          <th data-field="jenis_tanaman">Jenis</th>
        </tr>"#;

    #[test]
    fn every_record_is_field_complete() {
        let html = format!(
            "<table>{HEADER}<tr><td>MyGAP 1</td><td>Ali</td><td>Cili</td></tr></table>"
        );
        let (records, deferred) = extract_from(&html);
        assert!(deferred.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].values().len(), cfg().fields.len());
        assert_eq!(records[0].get(0), "MyGAP 1");
        assert_eq!(records[0].get(cfg().field_index("jenis_tanaman").unwrap()), "Cili");
        // Unmapped schema fields are the empty sentinel.
        assert_eq!(records[0].get(cfg().field_index("negeri").unwrap()), "");
    }

    #[test]
    fn blank_rows_are_extracted_but_marked_blank() {
        let html = format!(
            "<table>{HEADER}\
             <tr><td></td><td></td><td></td></tr>\
             <tr><td>MyGAP 2</td><td></td><td></td></tr></table>"
        );
        let (records, _) = extract_from(&html);
        assert_eq!(records.len(), 2);
        assert!(records[0].is_blank());
        assert!(!records[1].is_blank());
    }

    #[test]
    fn truncated_cell_with_link_is_deferred() {
        let html = format!(
            r#"<table>{HEADER}
               <tr>
                 <td>MyGAP 3</td><td>Ali</td>
                 <td>Cili, Tomato, More ...
                   <a href="javascript:void(0);" data-query="fulltext.php?id=3&amp;f=jenis_tanaman">More ...</a>
                 </td>
               </tr></table>"#
        );
        let (records, deferred) = extract_from(&html);
        assert_eq!(deferred.len(), 1);
        let d = &deferred[0];
        assert_eq!(d.row, 0);
        assert_eq!(d.field, cfg().field_index("jenis_tanaman").unwrap());
        assert_eq!(d.url, "fulltext.php?id=3&f=jenis_tanaman");
        // Placeholder keeps the cleaned prefix until the follow-up lands.
        assert_eq!(records[0].get(d.field), "Cili, Tomato");
    }

    #[test]
    fn truncated_cell_without_link_is_cleaned_in_place() {
        let html = format!(
            r#"<table>{HEADER}
               <tr><td>MyGAP 4</td><td>Ali</td><td>Cili, Padi, More ...</td></tr>
               </table>"#
        );
        let (records, deferred) = extract_from(&html);
        assert!(deferred.is_empty());
        assert_eq!(
            records[0].get(cfg().field_index("jenis_tanaman").unwrap()),
            "Cili, Padi"
        );
    }

    #[test]
    fn href_carrying_the_query_is_deferred() {
        // Some anchors put the fulltext query on href with no data-query.
        let html = format!(
            r#"<table>{HEADER}
               <tr>
                 <td>MyGAP 8</td><td>Ali</td>
                 <td>Cili More ...
                   <a href="fulltext.php?id=8">More ...</a>
                 </td>
               </tr></table>"#
        );
        let (_, deferred) = extract_from(&html);
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].url, "fulltext.php?id=8");
    }

    #[test]
    fn javascript_void_href_is_not_a_follow_up() {
        let html = format!(
            r#"<table>{HEADER}
               <tr>
                 <td>MyGAP 5</td><td>Ali</td>
                 <td>Cili More ...
                   <a href="x" data-query="javascript:void(0);">More ...</a>
                 </td>
               </tr></table>"#
        );
        let (records, deferred) = extract_from(&html);
        assert!(deferred.is_empty());
        assert_eq!(records[0].get(cfg().field_index("jenis_tanaman").unwrap()), "Cili");
    }

    #[test]
    fn deferred_rows_index_the_provisional_vector() {
        // A blank row sits before the truncated one. Indices must address
        // the pre-filter vector, so the deferred row is 1, not 0.
        let html = format!(
            r#"<table>{HEADER}
               <tr><td></td><td></td><td></td></tr>
               <tr>
                 <td>MyGAP 6</td><td>Ali</td>
                 <td>Cili More ...
                   <a data-query="fulltext.php?id=6">More ...</a>
                 </td>
               </tr></table>"#
        );
        let (records, deferred) = extract_from(&html);
        assert_eq!(records.len(), 2);
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].row, 1);
        assert_eq!(records[1].get(0), "MyGAP 6");
    }

    #[test]
    fn short_rows_keep_empty_sentinels() {
        let html = format!("<table>{HEADER}<tr><td>MyGAP 7</td></tr></table>");
        let (records, _) = extract_from(&html);
        assert_eq!(records[0].get(0), "MyGAP 7");
        assert_eq!(records[0].get(cfg().field_index("nama").unwrap()), "");
    }

    #[test]
    fn strip_more_suffix_drops_marker_and_dangling_comma() {
        assert_eq!(strip_more_suffix("Cili, Tomato, More ..."), "Cili, Tomato");
        assert_eq!(strip_more_suffix("Cili More..."), "Cili");
        assert_eq!(strip_more_suffix("More ..."), "");
    }
}
