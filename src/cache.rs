use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde_json::Value;
use tracing::{info, warn};

use crate::category::CategoryConfig;
use crate::error::ExtractError;
use crate::fetch;
use crate::record::{ExtractionResult, RowRecord};

/// Artifacts older than this trigger a fresh fetch.
const MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Where a result came from, for log lines and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Fresh,
}

/// Freshness gate: serve the newest same-category artifact if it is younger
/// than one day, otherwise run a live fetch with saving enabled.
///
/// A corrupt or unreadable artifact falls through to a fresh fetch rather
/// than failing the caller. Not synchronized: two concurrent callers seeing
/// a stale cache may both fetch, which wastes a request but stays correct.
pub async fn load_or_fetch(
    cfg: &'static CategoryConfig,
    dir: &Path,
) -> Result<(ExtractionResult, Source), ExtractError> {
    if let Some(path) = latest_artifact(cfg, dir) {
        match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(mtime) if is_fresh(mtime, SystemTime::now()) => {
                match read_artifact(&path, cfg) {
                    Ok(result) => {
                        info!(
                            "Loaded {} records from cache: {}",
                            result.records.len(),
                            path.display()
                        );
                        return Ok((result, Source::Cache));
                    }
                    Err(e) => warn!("Failed to read cache file {}: {}", path.display(), e),
                }
            }
            Ok(_) => info!("Cache file {} is stale, fetching fresh data", path.display()),
            Err(e) => warn!("Cannot stat cache file {}: {}", path.display(), e),
        }
    }

    let result = fetch::extract_category(cfg, true, dir).await?;
    Ok((result, Source::Fresh))
}

/// Age check against file modification time. A clock skew that puts the
/// mtime in the future counts as fresh.
pub fn is_fresh(mtime: SystemTime, now: SystemTime) -> bool {
    now.duration_since(mtime)
        .map(|age| age < MAX_AGE)
        .unwrap_or(true)
}

/// Newest same-category JSON artifact in `dir`, by modification time.
pub fn latest_artifact(cfg: &CategoryConfig, dir: &Path) -> Option<PathBuf> {
    let prefix = format!("mygap_data_{}_", cfg.name);
    let entries = fs::read_dir(dir).ok()?;

    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with(&prefix) && name.ends_with(".json")
        })
        .filter_map(|e| {
            let mtime = e.metadata().ok()?.modified().ok()?;
            Some((mtime, e.path()))
        })
        .max_by_key(|(mtime, _)| *mtime)
        .map(|(_, path)| path)
}

/// Read a persisted artifact. Accepts both the metadata-wrapped form and the
/// legacy bare-array form; either yields the same record list.
pub fn read_artifact(path: &Path, cfg: &'static CategoryConfig) -> Result<ExtractionResult> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&body).with_context(|| format!("parsing {}", path.display()))?;

    let (data, extracted_at) = match &value {
        Value::Array(_) => (&value, None),
        Value::Object(map) => {
            let data = map
                .get("data")
                .filter(|d| d.is_array())
                .context("object artifact has no data array")?;
            let at = map
                .get("metadata")
                .and_then(|m| m.get("extracted_at"))
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Local));
            (data, at)
        }
        _ => bail!("artifact {} is neither array nor object", path.display()),
    };

    let records: Vec<RowRecord> = data
        .as_array()
        .expect("checked above")
        .iter()
        .map(|v| RowRecord::from_json(v, cfg.fields))
        .collect();

    Ok(ExtractionResult::at(
        cfg,
        records,
        extracted_at.unwrap_or_else(Local::now),
    ))
}

// ── Tests ──
