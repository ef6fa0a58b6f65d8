//! External Boundaries
//!
//! The reconciliation core never sees documents, templates or PDFs directly.
//! Each boundary is an async trait the pipeline owns:
//! - **[`FactExtractor`]:** document bytes → [`FactSet`]
//! - **[`SchemaSource`]:** template bytes → ordered [`FormField`]s
//! - **[`FormWriter`]:** template + filled values → output bytes
//! - **[`BlobStore`]:** upload storage for documents and templates
//!
//! JSON-backed implementations live in [`json`], an in-memory store in [`memory`].

pub mod json;
pub mod memory;

pub use json::{JsonFactExtractor, JsonFormWriter, JsonSchemaSource};
pub use memory::InMemoryBlobStore;

use crate::error::{ExtractionError, SchemaError, StorageError, WriteError};
use crate::types::{FactSet, FormField};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Reads key/value facts out of a source document
#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// Adapter identifier for logs
    fn name(&self) -> &'static str;

    /// Extract facts from raw document bytes
    ///
    /// # Errors
    /// `ExtractionError` when the document cannot be read at all. Individual
    /// unusable entries are skipped, not reported as errors.
    async fn extract(&self, document: &[u8]) -> Result<FactSet, ExtractionError>;
}

/// Lists the fillable fields of a form template
#[async_trait]
pub trait SchemaSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fields in template declaration order
    async fn list_fields(&self, template: &[u8]) -> Result<Vec<FormField>, SchemaError>;
}

/// Renders filled values into an output document
///
/// Receives only the filled values, never the resolver trace.
#[async_trait]
pub trait FormWriter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn write_values(
        &self,
        template: &[u8],
        filled: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, WriteError>;
}

/// Opaque handle to a stored blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageRef(pub Uuid);

impl StorageRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StorageRef {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StorageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StorageRef {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(StorageRef)
            .map_err(|_| StorageError::NotFound(s.to_string()))
    }
}

/// Upload storage boundary
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>) -> Result<StorageRef, StorageError>;

    async fn get(&self, reference: &StorageRef) -> Result<Vec<u8>, StorageError>;
}
