//! sbf-recon: form reconciliation engine for SmartBarangay
//!
//! Maps facts extracted from an identity document onto the fields of a
//! barangay form, fills what it can, and reports what a person still has
//! to complete.
//!
//! ```rust,ignore
//! use sbf_recon::{apply_overrides, Override, Reconciler};
//!
//! let result = Reconciler::default().reconcile(&facts, &fields);
//! for missing in result.missing_fields() {
//!     println!("{}: {}", missing.name, missing.reason);
//! }
//! let corrected = apply_overrides(&result, &[Override::human("middle_name", "Reyes")]);
//! ```

pub mod adapters;
pub mod error;
pub mod fill;
pub mod normalizer;
pub mod overrides;
pub mod pipeline;
pub mod resolver;
pub mod rules;
pub mod types;

pub use crate::error::{ReconError, ReconResult};
pub use crate::fill::FillEngine;
pub use crate::normalizer::{FieldNormalizer, SynonymTable};
pub use crate::overrides::apply_overrides;
pub use crate::pipeline::{Reconciler, ReconciliationPipeline};
pub use crate::resolver::MappingResolver;
pub use crate::rules::MatchRules;
pub use crate::types::{
    ExtractedFact, FactSet, FieldSource, FillResult, FormField, MappingEntry, MissingField,
    MissingReason, Override, TypeHint,
};
