use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::category::CategoryConfig;
use crate::error::ExtractError;
use crate::record::ExtractionResult;

/// Artifact file name, category-scoped so the freshness gate can scan one
/// category without matching another's files.
pub fn artifact_name(cfg: &CategoryConfig, timestamp: &str, ext: &str) -> String {
    format!("mygap_data_{}_{}.{}", cfg.name, timestamp, ext)
}

/// The metadata-wrapped JSON form: `{ "metadata": {...}, "data": [...] }`.
pub fn json_value(result: &ExtractionResult) -> Value {
    let cfg = result.cfg;
    let data: Vec<Value> = result
        .records
        .iter()
        .map(|r| r.to_json(cfg.fields))
        .collect();
    json!({
        "metadata": {
            "extracted_at": result.extracted_at.to_rfc3339(),
            "timestamp": result.timestamp,
            "total_records": result.records.len(),
            "fields": cfg.fields,
        },
        "data": data,
    })
}

/// Write the JSON artifact, returning its path.
pub fn write_json(result: &ExtractionResult, dir: &Path) -> Result<PathBuf, ExtractError> {
    let path = dir.join(artifact_name(result.cfg, &result.timestamp, "json"));
    let body = serde_json::to_string_pretty(&json_value(result))
        .expect("extraction result serializes");
    fs::write(&path, body)?;
    Ok(path)
}

/// Write the CSV artifact: header row in schema order, one line per record,
/// empty strings for missing values.
pub fn write_csv(result: &ExtractionResult, dir: &Path) -> Result<PathBuf, ExtractError> {
    let cfg = result.cfg;
    let path = dir.join(artifact_name(cfg, &result.timestamp, "csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(cfg.fields)?;
    for record in &result.records {
        writer.write_record(record.values())?;
    }
    writer.flush()?;
    Ok(path)
}

// ── Tests ──
