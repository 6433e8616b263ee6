use scraper::{ElementRef, Html, Selector};

use crate::category::CategoryConfig;
use crate::error::ExtractError;

/// Schema position → column position within the resolved table. `None` means
/// the table has no column for that field; every row gets the empty sentinel
/// there.
pub type ColumnMap = Vec<Option<usize>>;

/// The located data table, its header row, and the column map built from it.
/// Scoped to one extraction run; the borrow ties it to the parsed document.
#[derive(Debug)]
pub struct ResolvedTable<'a> {
    pub table: ElementRef<'a>,
    /// Position of the header row among the table's `<tr>` elements. Data
    /// rows start strictly after it.
    pub header_row: usize,
    pub columns: ColumnMap,
}

/// Locate the data table via the schema's first field and map every tagged
/// column to its position.
///
/// The header row is the first row where any cell's `data-field` attribute
/// matches the schema. Decorative columns (checkboxes, action buttons) carry
/// no tag and are skipped; the schema does not need to be fully present.
pub fn resolve<'a>(
    doc: &'a Html,
    cfg: &CategoryConfig,
) -> Result<ResolvedTable<'a>, ExtractError> {
    let anchor_sel = Selector::parse(&format!("th[data-field=\"{}\"]", cfg.fields[0]))
        .expect("anchor selector");
    let anchor = doc.select(&anchor_sel).next().ok_or_else(|| {
        ExtractError::SchemaNotFound(format!(
            "no header cell with data-field=\"{}\" in {} listing",
            cfg.fields[0], cfg.name
        ))
    })?;

    let table = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
        .ok_or_else(|| {
            ExtractError::SchemaNotFound(format!(
                "header cell for {} is not inside a table",
                cfg.fields[0]
            ))
        })?;

    let tr_sel = Selector::parse("tr").expect("tr selector");
    let cell_sel = Selector::parse("th, td").expect("cell selector");

    for (row_index, row) in table.select(&tr_sel).enumerate() {
        let mut columns: ColumnMap = vec![None; cfg.fields.len()];
        let mut matched = 0usize;

        for (position, cell) in row.select(&cell_sel).enumerate() {
            let Some(field) = cell.value().attr("data-field") else {
                continue;
            };
            if let Some(index) = cfg.field_index(field) {
                if columns[index].is_none() {
                    columns[index] = Some(position);
                    matched += 1;
                }
            }
        }

        if matched > 0 {
            return Ok(ResolvedTable {
                table,
                header_row: row_index,
                columns,
            });
        }
    }

    Err(ExtractError::SchemaNotFound(format!(
        "no table row matches any {} schema field",
        cfg.name
    )))
}

// ── Tests ──
