// Match Rules - Injected Matching Configuration
//
// Everything the resolver consults that is a policy choice rather than an
// algorithm: synonyms, composite and split patterns, fuzzy thresholds, the
// confidence gate and the date output format.
//
// Built from compiled defaults or from the [reconciliation] section of the
// TOML config, then handed to the resolver so runs stay reproducible.

use crate::normalizer::{FieldNormalizer, SynonymTable};
use crate::types::{Confidence, Joiner, Separator, SplitSelector};
use sbf_common::config::ReconciliationSettings;
use sbf_common::{Error, Result};

pub const DEFAULT_CONFIDENCE_THRESHOLD: Confidence = 0.4;
pub const DEFAULT_DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d";

/// Several facts that jointly satisfy one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositePattern {
    /// Normalized target token
    pub target: String,
    /// Normalized part tokens, in join order
    pub parts: Vec<String>,
    pub joiner: Joiner,
}

/// One fact that is cut into several fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPattern {
    /// Normalized source token
    pub source: String,
    pub separator: Separator,
    /// (normalized target token, selector)
    pub parts: Vec<(String, SplitSelector)>,
}

impl SplitPattern {
    pub fn selector_for(&self, target: &str) -> Option<SplitSelector> {
        self.parts
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, select)| *select)
    }
}

/// Fuzzy pass thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyRule {
    pub max_edit_distance: usize,
    pub min_token_len: usize,
}

impl Default for FuzzyRule {
    fn default() -> Self {
        Self {
            max_edit_distance: 2,
            min_token_len: 3,
        }
    }
}

impl FuzzyRule {
    /// Containment (either direction) or small edit distance
    ///
    /// Both sides are normalized tokens. Short tokens ("id", "no") only
    /// ever match exactly, never fuzzily.
    pub fn qualifies(&self, field: &str, fact: &str) -> bool {
        let field_len = field.chars().count();
        let fact_len = fact.chars().count();
        let shorter = field_len.min(fact_len);

        if shorter < self.min_token_len {
            return false;
        }
        if field.contains(fact) || fact.contains(field) {
            return true;
        }
        shorter > self.min_token_len
            && strsim::levenshtein(field, fact) <= self.max_edit_distance
    }
}

/// Complete matching configuration for one resolver
#[derive(Debug, Clone)]
pub struct MatchRules {
    pub(crate) normalizer: FieldNormalizer,
    pub(crate) composites: Vec<CompositePattern>,
    pub(crate) splits: Vec<SplitPattern>,
    pub(crate) fuzzy: FuzzyRule,
    pub(crate) confidence_threshold: Confidence,
    pub(crate) date_output_format: String,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MatchRules {
    /// Compiled defaults
    pub fn builtin() -> Self {
        let normalizer = FieldNormalizer::new(SynonymTable::builtin());
        let composites = builtin_composites(&normalizer);
        let splits = builtin_splits(&normalizer);
        Self {
            normalizer,
            composites,
            splits,
            fuzzy: FuzzyRule::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            date_output_format: DEFAULT_DATE_OUTPUT_FORMAT.to_string(),
        }
    }

    /// Rules with no synonyms or patterns: exact and fuzzy passes only
    pub fn empty() -> Self {
        Self {
            normalizer: FieldNormalizer::new(SynonymTable::new()),
            composites: Vec::new(),
            splits: Vec::new(),
            fuzzy: FuzzyRule::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            date_output_format: DEFAULT_DATE_OUTPUT_FORMAT.to_string(),
        }
    }

    /// Build rules from the [reconciliation] config section
    ///
    /// Configured tables extend the built-in ones unless
    /// `extend_defaults = false`. Configured patterns are tried before
    /// built-in ones.
    pub fn from_settings(settings: &ReconciliationSettings) -> Result<Self> {
        settings.validate()?;

        let mut synonyms = if settings.extend_defaults {
            SynonymTable::builtin()
        } else {
            SynonymTable::new()
        };
        for (canonical, aliases) in &settings.synonyms {
            for alias in aliases {
                synonyms.insert(canonical, alias);
            }
        }
        let normalizer = FieldNormalizer::new(synonyms);

        let mut composites = Vec::new();
        for c in &settings.composites {
            composites.push(CompositePattern {
                target: normalizer.canonical_name(&c.target),
                parts: c.parts.iter().map(|p| normalizer.canonical_name(p)).collect(),
                joiner: Joiner::from_config(&c.joiner),
            });
        }

        let mut splits = Vec::new();
        for s in &settings.splits {
            let mut parts = Vec::new();
            for part in &s.parts {
                let select = SplitSelector::from_config(&part.select).ok_or_else(|| {
                    Error::Config(format!(
                        "split '{}': unknown selector '{}' (expected first, last, inner or an index)",
                        s.source, part.select
                    ))
                })?;
                parts.push((normalizer.canonical_name(&part.target), select));
            }
            splits.push(SplitPattern {
                source: normalizer.canonical_name(&s.source),
                separator: match &s.separator {
                    Some(sep) => Separator::Text(sep.clone()),
                    None => Separator::Whitespace,
                },
                parts,
            });
        }

        if settings.extend_defaults {
            composites.extend(builtin_composites(&normalizer));
            splits.extend(builtin_splits(&normalizer));
        }

        Ok(Self {
            normalizer,
            composites,
            splits,
            fuzzy: FuzzyRule {
                max_edit_distance: settings.fuzzy.max_edit_distance,
                min_token_len: settings.fuzzy.min_token_len,
            },
            confidence_threshold: settings.confidence_threshold,
            date_output_format: settings.date_output_format.clone(),
        })
    }

    pub fn with_confidence_threshold(mut self, threshold: Confidence) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_composite(mut self, target: &str, parts: &[&str], joiner: Joiner) -> Self {
        let pattern = CompositePattern {
            target: self.normalizer.canonical_name(target),
            parts: parts.iter().map(|p| self.normalizer.canonical_name(p)).collect(),
            joiner,
        };
        self.composites.insert(0, pattern);
        self
    }

    pub fn normalizer(&self) -> &FieldNormalizer {
        &self.normalizer
    }

    pub fn confidence_threshold(&self) -> Confidence {
        self.confidence_threshold
    }

    pub fn date_output_format(&self) -> &str {
        &self.date_output_format
    }
}

fn builtin_composites(normalizer: &FieldNormalizer) -> Vec<CompositePattern> {
    let table: &[(&str, &[&str], Joiner)] = &[
        (
            "full_name",
            &["first_name", "middle_name", "last_name"],
            Joiner::Space,
        ),
        ("full_name", &["first_name", "last_name"], Joiner::Space),
        (
            "address",
            &["street", "barangay", "city"],
            Joiner::Custom(", ".to_string()),
        ),
        ("address", &["street", "city"], Joiner::Custom(", ".to_string())),
    ];
    table
        .iter()
        .map(|(target, parts, joiner)| CompositePattern {
            target: normalizer.canonical_name(target),
            parts: parts.iter().map(|p| normalizer.canonical_name(p)).collect(),
            joiner: joiner.clone(),
        })
        .collect()
}

fn builtin_splits(normalizer: &FieldNormalizer) -> Vec<SplitPattern> {
    vec![SplitPattern {
        source: normalizer.canonical_name("full_name"),
        separator: Separator::Whitespace,
        parts: vec![
            (normalizer.canonical_name("first_name"), SplitSelector::First),
            (normalizer.canonical_name("middle_name"), SplitSelector::Inner),
            (normalizer.canonical_name("last_name"), SplitSelector::Last),
        ],
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbf_common::config::{CompositeSettings, SplitPartSettings, SplitSettings};

    #[test]
    fn test_fuzzy_containment() {
        let rule = FuzzyRule::default();
        assert!(rule.qualifies("name", "nickname"));
        assert!(rule.qualifies("name", "first_name"));
        assert!(rule.qualifies("contact_number", "number"));
    }

    #[test]
    fn test_fuzzy_edit_distance() {
        let rule = FuzzyRule::default();
        assert!(rule.qualifies("adress", "address"));
        assert!(rule.qualifies("civil_statu", "civil_status"));
        assert!(!rule.qualifies("purpose", "province"));
    }

    #[test]
    fn test_fuzzy_ignores_short_tokens() {
        let rule = FuzzyRule::default();
        assert!(!rule.qualifies("id", "id_number"));
        // length 3 may contain but not edit-match
        assert!(!rule.qualifies("age", "ago"));
        assert!(rule.qualifies("age", "age_group"));
    }

    #[test]
    fn test_builtin_patterns_normalized() {
        let rules = MatchRules::builtin();
        assert_eq!(rules.composites[0].target, "full_name");
        assert_eq!(rules.composites[1].parts, vec!["first_name", "last_name"]);
        assert_eq!(rules.splits[0].selector_for("last_name"), Some(SplitSelector::Last));
        assert_eq!(rules.confidence_threshold(), 0.4);
    }

    #[test]
    fn test_from_settings_extends_defaults() {
        let mut settings = ReconciliationSettings::default();
        settings
            .synonyms
            .insert("barangay".into(), vec!["brgy".into()]);
        settings.composites.push(CompositeSettings {
            target: "Complete Address".into(),
            parts: vec!["Street".into(), "Brgy".into()],
            joiner: ", ".into(),
        });

        let rules = MatchRules::from_settings(&settings).unwrap();
        assert_eq!(rules.normalizer().canonical_name("Brgy"), "barangay");
        assert_eq!(rules.normalizer().canonical_name("DOB"), "date_of_birth");
        // configured pattern first, parts run through synonyms
        assert_eq!(rules.composites[0].target, "complete_address");
        assert_eq!(rules.composites[0].parts, vec!["street", "barangay"]);
        assert_eq!(rules.composites[0].joiner, Joiner::Custom(", ".into()));
        assert!(rules.composites.len() > 1);
    }

    #[test]
    fn test_from_settings_replaces_defaults() {
        let settings = ReconciliationSettings {
            extend_defaults: false,
            ..Default::default()
        };
        let rules = MatchRules::from_settings(&settings).unwrap();
        assert!(rules.composites.is_empty());
        assert!(rules.splits.is_empty());
        assert_eq!(rules.normalizer().canonical_name("DOB"), "dob");
    }

    #[test]
    fn test_from_settings_rejects_unknown_selector() {
        let mut settings = ReconciliationSettings::default();
        settings.splits.push(SplitSettings {
            source: "full_name".into(),
            separator: None,
            parts: vec![SplitPartSettings {
                target: "first_name".into(),
                select: "second-to-last".into(),
            }],
        });
        assert!(matches!(
            MatchRules::from_settings(&settings),
            Err(Error::Config(_))
        ));
    }
}
