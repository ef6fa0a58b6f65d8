//! Error types for sbf-recon
//!
//! Only adapter-level failures are errors. Data-quality problems (missing,
//! ambiguous, low-confidence or uncoercible values) are never errors: they
//! resolve to a `MappingEntry` variant or a missing-field reason.

use thiserror::Error;

/// Extraction adapter failure (document could not be read)
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Adapter reported a failure with a human-readable message
    #[error("Extraction failed: {0}")]
    Failed(String),

    /// Payload was not in the expected shape
    #[error("Malformed extraction payload: {0}")]
    Malformed(String),
}

/// Schema adapter failure (template has no discoverable fields)
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Template declares no fillable fields
    #[error("Form template has no fillable fields")]
    NoFields,

    /// Template could not be parsed
    #[error("Malformed form schema: {0}")]
    Malformed(String),
}

/// Form writer failure
#[derive(Debug, Error)]
#[error("Form write failed: {0}")]
pub struct WriteError(pub String);

/// Upload storage failure
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage reference not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Backend(String),
}

/// Run-level error: everything that halts a reconciliation run
#[derive(Debug, Error)]
pub enum ReconError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// JSON (de)serialization at a boundary
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// sbf-common error
    #[error("Common error: {0}")]
    Common(#[from] sbf_common::Error),
}

/// Result type for reconciliation runs
pub type ReconResult<T> = Result<T, ReconError>;
