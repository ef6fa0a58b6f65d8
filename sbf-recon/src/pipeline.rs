// Reconciliation Pipeline
//
// Wires the adapters to the pure core:
//   document  -> FactExtractor -> FactSet ----\
//   template  -> SchemaSource  -> FormFields --> Reconciler -> FillResult
//   FillResult.filled_fields -> FormWriter -> output bytes
//
// Adapter failures halt the run before the resolver. Everything past that
// point is infallible: data-quality problems end up in missing_fields.

use crate::adapters::{FactExtractor, FormWriter, SchemaSource};
use crate::error::{ReconResult, SchemaError};
use crate::fill::FillEngine;
use crate::resolver::MappingResolver;
use crate::rules::MatchRules;
use crate::types::{FactSet, FillResult, FormField};
use sbf_common::config::ReconciliationSettings;
use std::sync::Arc;
use tracing::{info, warn};

/// Resolve then fill, with one set of rules
#[derive(Debug, Clone)]
pub struct Reconciler {
    resolver: MappingResolver,
    engine: FillEngine,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::from_rules(MatchRules::builtin())
    }
}

impl Reconciler {
    pub fn from_rules(rules: MatchRules) -> Self {
        let engine = FillEngine::new(rules.date_output_format());
        Self {
            resolver: MappingResolver::new(rules),
            engine,
        }
    }

    /// Rules from the `[reconciliation]` config section
    pub fn from_settings(settings: &ReconciliationSettings) -> sbf_common::Result<Self> {
        Ok(Self::from_rules(MatchRules::from_settings(settings)?))
    }

    pub fn rules(&self) -> &MatchRules {
        self.resolver.rules()
    }

    /// Pure and deterministic: same inputs, same result
    pub fn reconcile(&self, facts: &FactSet, fields: &[FormField]) -> FillResult {
        let mappings = self.resolver.resolve(facts, fields);
        self.engine.fill(&mappings)
    }
}

/// Extraction + schema adapters around a [`Reconciler`]
#[derive(Clone)]
pub struct ReconciliationPipeline {
    extractor: Arc<dyn FactExtractor>,
    schema: Arc<dyn SchemaSource>,
    reconciler: Reconciler,
}

impl ReconciliationPipeline {
    pub fn new(
        extractor: Arc<dyn FactExtractor>,
        schema: Arc<dyn SchemaSource>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            extractor,
            schema,
            reconciler,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Extract, list fields, reconcile
    ///
    /// # Errors
    /// - `ReconError::Extraction` when the document cannot be read
    /// - `ReconError::Schema` when the template is malformed or has no fields
    pub async fn run(&self, document: &[u8], template: &[u8]) -> ReconResult<FillResult> {
        let facts = self.extractor.extract(document).await.map_err(|e| {
            warn!(extractor = self.extractor.name(), error = %e, "Extraction failed; run halted");
            e
        })?;

        let fields = self.schema.list_fields(template).await.map_err(|e| {
            warn!(schema = self.schema.name(), error = %e, "Schema listing failed; run halted");
            e
        })?;
        if fields.is_empty() {
            warn!(schema = self.schema.name(), "Template has no fields; run halted");
            return Err(SchemaError::NoFields.into());
        }

        info!(
            facts = facts.len(),
            fields = fields.len(),
            "Reconciling document against template"
        );
        Ok(self.reconciler.reconcile(&facts, &fields))
    }

    /// Hand the filled values (never the trace) to a writer
    pub async fn finalize(
        &self,
        writer: &dyn FormWriter,
        template: &[u8],
        result: &FillResult,
    ) -> ReconResult<Vec<u8>> {
        let bytes = writer
            .write_values(template, result.filled_fields())
            .await?;
        info!(
            writer = writer.name(),
            fields = result.filled_fields().len(),
            bytes = bytes.len(),
            "Form written"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractedFact, TypeHint};

    #[test]
    fn test_reconciler_uses_configured_date_format() {
        let settings = ReconciliationSettings {
            date_output_format: "%d/%m/%Y".to_string(),
            ..Default::default()
        };
        let reconciler = Reconciler::from_settings(&settings).unwrap();
        let facts: FactSet = vec![ExtractedFact::new("dob", "1990-05-01")].into();
        let fields = vec![FormField::new("date_of_birth").with_type(TypeHint::Date)];

        let result = reconciler.reconcile(&facts, &fields);
        assert_eq!(result.value("date_of_birth"), Some("01/05/1990"));
    }

    #[test]
    fn test_reconcile_deterministic() {
        let reconciler = Reconciler::default();
        let facts: FactSet = vec![
            ExtractedFact::new("first_name", "Ana"),
            ExtractedFact::new("last_name", "Cruz"),
        ]
        .into();
        let fields = vec![FormField::new("full_name"), FormField::new("purpose")];
        assert_eq!(
            reconciler.reconcile(&facts, &fields),
            reconciler.reconcile(&facts, &fields)
        );
    }
}
