use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use crate::category::CategoryConfig;

/// One certification entry: one string value per schema field, positionally
/// aligned with the category's field list. Every field exists from
/// construction with the empty-string sentinel, so a missing key is
/// unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    values: Vec<String>,
}

impl RowRecord {
    /// A record with every field set to the empty sentinel.
    pub fn blank(cfg: &CategoryConfig) -> Self {
        Self {
            values: vec![String::new(); cfg.fields.len()],
        }
    }

    pub fn get(&self, field: usize) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    /// Overwrite one field. Out-of-range indices are ignored rather than
    /// panicking; callers address fields by schema position.
    pub fn set(&mut self, field: usize, value: String) {
        if let Some(slot) = self.values.get_mut(field) {
            *slot = value;
        }
    }

    /// True when every field is empty, i.e. the row carries no data at all.
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// JSON object keyed by field identifier, one key per schema field.
    pub fn to_json(&self, fields: &[&str]) -> Value {
        let mut map = Map::new();
        for (field, value) in fields.iter().zip(&self.values) {
            map.insert((*field).to_string(), Value::String(value.clone()));
        }
        Value::Object(map)
    }

    /// Rebuild a record from a JSON object. Absent or non-string fields
    /// become the empty sentinel, preserving the field-complete invariant.
    pub fn from_json(value: &Value, fields: &[&str]) -> Self {
        let values = fields
            .iter()
            .map(|f| {
                value
                    .get(*f)
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string()
            })
            .collect();
        Self { values }
    }
}

/// The finished output of one extraction run: the surviving records plus the
/// metadata persisted alongside them.
#[derive(Debug)]
pub struct ExtractionResult {
    pub cfg: &'static CategoryConfig,
    pub extracted_at: DateTime<Local>,
    /// Compact timestamp used in artifact file names (`%Y%m%d_%H%M%S`).
    pub timestamp: String,
    pub records: Vec<RowRecord>,
}

impl ExtractionResult {
    pub fn new(cfg: &'static CategoryConfig, records: Vec<RowRecord>) -> Self {
        Self::at(cfg, records, Local::now())
    }

    pub fn at(
        cfg: &'static CategoryConfig,
        records: Vec<RowRecord>,
        extracted_at: DateTime<Local>,
    ) -> Self {
        let timestamp = extracted_at.format("%Y%m%d_%H%M%S").to_string();
        Self {
            cfg,
            extracted_at,
            timestamp,
            records,
        }
    }
}

// ── Tests ──
