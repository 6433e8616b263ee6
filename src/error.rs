use reqwest::StatusCode;

/// Failures that abort an extraction run. A run never returns partial data:
/// either the listing page parses against the schema or the caller gets one
/// of these.
///
/// Truncation follow-up failures and cache read failures are deliberately
/// absent; both are recovered locally (placeholder text kept, fresh fetch
/// triggered) and only logged.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Connection-level failure talking to the registry.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The listing fetch came back non-2xx after retries.
    #[error("source returned status {0}")]
    Status(StatusCode),

    /// No table row matched any schema field. The site markup changed or the
    /// wrong schema was used; needs operator attention, not silent retries.
    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    /// Writing an output artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the CSV artifact failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
