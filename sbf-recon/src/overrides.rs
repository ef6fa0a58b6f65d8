// Manual Override Merge
//
// Layers human-entered values on top of a FillResult. Pure: the input is
// never modified, a new FillResult is returned. The resolver trace is kept
// untouched so the audit trail survives corrections.

use crate::types::{FieldSource, FillResult, Override};
use tracing::{debug, info};

/// Apply overrides in order; later overrides of the same field win
///
/// - missing field: moved into `filled_fields`
/// - filled field: value replaced, previous automatic value remembered
/// - unknown field: added to `filled_fields`
///
/// Applying the same list twice yields the same result.
pub fn apply_overrides(result: &FillResult, overrides: &[Override]) -> FillResult {
    let mut merged = result.clone();

    for o in overrides {
        let replaced = match merged.provenance.get(&o.field) {
            // Keep what the machine produced, not an earlier human value
            Some(FieldSource::Human { replaced }) => replaced.clone(),
            _ => merged.filled_fields.get(&o.field).cloned(),
        };

        merged.missing_fields.retain(|m| m.name != o.field);
        merged.filled_fields.insert(o.field.clone(), o.value.clone());
        merged
            .provenance
            .insert(o.field.clone(), FieldSource::Human { replaced });

        debug!(field = %o.field, "Override applied");
    }

    if !overrides.is_empty() {
        info!(
            overrides = overrides.len(),
            still_missing = merged.missing_fields.len(),
            "Overrides merged"
        );
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::FillEngine;
    use crate::types::{FactRef, FieldRef, FormField, MappingEntry, TypeHint, UnmappedReason};

    fn base_result() -> FillResult {
        FillEngine::default().fill(&[
            MappingEntry::Single {
                fact: FactRef {
                    name: "first_name".into(),
                    raw_value: "Ana".into(),
                    confidence: 0.9,
                },
                target_field: FieldRef::from(&FormField::new("first_name").with_type(TypeHint::Text)),
            },
            MappingEntry::Unmapped {
                target_field: FieldRef::from(&FormField::new("middle_name")),
                reason: UnmappedReason::NoCandidate,
            },
        ])
    }

    #[test]
    fn test_empty_overrides_identity() {
        let result = base_result();
        assert_eq!(apply_overrides(&result, &[]), result);
    }

    #[test]
    fn test_missing_field_moves_to_filled() {
        let result = base_result();
        let merged = apply_overrides(&result, &[Override::human("middle_name", "Reyes")]);
        assert_eq!(merged.value("middle_name"), Some("Reyes"));
        assert!(!merged.is_missing("middle_name"));
        assert_eq!(
            merged.provenance()["middle_name"],
            FieldSource::Human { replaced: None }
        );
        // input untouched
        assert!(result.is_missing("middle_name"));
        assert_eq!(merged.mappings(), result.mappings());
    }

    #[test]
    fn test_replacing_filled_value_records_previous() {
        let merged = apply_overrides(&base_result(), &[Override::human("first_name", "Anna")]);
        assert_eq!(merged.value("first_name"), Some("Anna"));
        assert_eq!(
            merged.provenance()["first_name"],
            FieldSource::Human {
                replaced: Some("Ana".into())
            }
        );
    }

    #[test]
    fn test_idempotent() {
        let overrides = vec![
            Override::human("first_name", "Anna"),
            Override::human("middle_name", "Reyes"),
        ];
        let once = apply_overrides(&base_result(), &overrides);
        let twice = apply_overrides(&once, &overrides);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_last_write_wins_for_same_field() {
        let merged = apply_overrides(
            &base_result(),
            &[
                Override::human("middle_name", "Reyes"),
                Override::human("middle_name", "Santos"),
            ],
        );
        assert_eq!(merged.value("middle_name"), Some("Santos"));
    }

    #[test]
    fn test_commutative_across_distinct_fields() {
        let a = Override::human("first_name", "Anna");
        let b = Override::human("middle_name", "Reyes");
        assert_eq!(
            apply_overrides(&base_result(), &[a.clone(), b.clone()]),
            apply_overrides(&base_result(), &[b, a])
        );
    }

    #[test]
    fn test_unknown_field_added() {
        let merged = apply_overrides(&base_result(), &[Override::human("ctc_number", "CTC-0042")]);
        assert_eq!(merged.value("ctc_number"), Some("CTC-0042"));
    }
}
