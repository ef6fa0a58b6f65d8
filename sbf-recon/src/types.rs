//! Core Types for the Reconciliation Engine
//!
//! Data model shared by the resolver, fill engine and override merge:
//! - **Inputs:** [`ExtractedFact`] (collected in a [`FactSet`]) and [`FormField`]
//! - **Resolver trace:** [`MappingEntry`]
//! - **Outputs:** [`FillResult`], corrected by [`Override`]s
//!
//! All types are immutable snapshots: a correction always produces a new
//! value rather than editing an existing one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confidence score (0.0-1.0)
pub type Confidence = f64;

fn full_confidence() -> Confidence {
    1.0
}

/// Clamp into [0, 1]; NaN counts as no confidence at all
pub fn clamp_confidence(confidence: Confidence) -> Confidence {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// One key/value datum extracted from a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    pub name: String,
    pub raw_value: String,
    /// Defaults to 1.0 when the extractor reports none
    #[serde(default = "full_confidence")]
    pub confidence: Confidence,
}

impl ExtractedFact {
    pub fn new(name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_value: raw_value.into(),
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }
}

/// Facts from one extraction run, keyed by name
///
/// Inserting a fact whose name is already present replaces the earlier value
/// (last-wins) but keeps the position of the first insertion, so iteration
/// order stays stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ExtractedFact>", into = "Vec<ExtractedFact>")]
pub struct FactSet {
    facts: Vec<ExtractedFact>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut fact: ExtractedFact) {
        fact.confidence = clamp_confidence(fact.confidence);
        match self.facts.iter_mut().find(|f| f.name == fact.name) {
            Some(existing) => *existing = fact,
            None => self.facts.push(fact),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ExtractedFact> {
        self.facts.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtractedFact> {
        self.facts.iter()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl FromIterator<ExtractedFact> for FactSet {
    fn from_iter<I: IntoIterator<Item = ExtractedFact>>(iter: I) -> Self {
        let mut set = FactSet::new();
        for fact in iter {
            set.insert(fact);
        }
        set
    }
}

impl From<Vec<ExtractedFact>> for FactSet {
    fn from(facts: Vec<ExtractedFact>) -> Self {
        facts.into_iter().collect()
    }
}

impl From<FactSet> for Vec<ExtractedFact> {
    fn from(set: FactSet) -> Self {
        set.facts
    }
}

impl<'a> IntoIterator for &'a FactSet {
    type Item = &'a ExtractedFact;
    type IntoIter = std::slice::Iter<'a, ExtractedFact>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.iter()
    }
}

/// Expected value type of a form field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeHint {
    Text,
    Date,
    Number,
    #[default]
    Unknown,
}

impl std::fmt::Display for TypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeHint::Text => write!(f, "text"),
            TypeHint::Date => write!(f, "date"),
            TypeHint::Number => write!(f, "number"),
            TypeHint::Unknown => write!(f, "unknown"),
        }
    }
}

/// One named slot in a target form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub type_hint: TypeHint,
}

impl FormField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            type_hint: TypeHint::Unknown,
        }
    }

    pub fn with_type(mut self, type_hint: TypeHint) -> Self {
        self.type_hint = type_hint;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

// ============================================================================
// Resolver trace
// ============================================================================

/// Snapshot of the fact a mapping consumed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRef {
    pub name: String,
    pub raw_value: String,
    pub confidence: Confidence,
}

impl From<&ExtractedFact> for FactRef {
    fn from(fact: &ExtractedFact) -> Self {
        Self {
            name: fact.name.clone(),
            raw_value: fact.raw_value.clone(),
            confidence: fact.confidence,
        }
    }
}

/// Snapshot of the field a mapping targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub name: String,
    pub type_hint: TypeHint,
    pub required: bool,
}

impl From<&FormField> for FieldRef {
    fn from(field: &FormField) -> Self {
        Self {
            name: field.name.clone(),
            type_hint: field.type_hint,
            required: field.required,
        }
    }
}

/// How combined fact values are glued together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joiner {
    Space,
    Concat,
    Custom(String),
}

impl Joiner {
    /// Parse the config spelling: "space", "concat", anything else is custom
    pub fn from_config(value: &str) -> Self {
        match value {
            "space" => Joiner::Space,
            "concat" => Joiner::Concat,
            other => Joiner::Custom(other.to_string()),
        }
    }

    pub fn separator(&self) -> &str {
        match self {
            Joiner::Space => " ",
            Joiner::Concat => "",
            Joiner::Custom(sep) => sep,
        }
    }
}

/// How a split source value is cut into segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Separator {
    Whitespace,
    Text(String),
}

/// Which segment(s) of a split value a field takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSelector {
    First,
    Last,
    /// Everything between the first and last segment
    Inner,
    Index(usize),
}

impl SplitSelector {
    /// Parse the config spelling: "first", "last", "inner" or an index
    pub fn from_config(value: &str) -> Option<Self> {
        match value.trim() {
            "first" => Some(SplitSelector::First),
            "last" => Some(SplitSelector::Last),
            "inner" => Some(SplitSelector::Inner),
            other => other.parse().ok().map(SplitSelector::Index),
        }
    }
}

/// The slice of a split fact that one field receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPart {
    pub separator: Separator,
    pub select: SplitSelector,
}

/// Why a field has no accepted mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnmappedReason {
    NoCandidate,
    /// More than one fuzzy candidate; never guessed
    Ambiguous { candidates: Vec<String> },
    /// Chosen candidate fell below the confidence threshold
    LowConfidence {
        facts: Vec<String>,
        confidence: Confidence,
    },
}

/// One resolver decision for one form field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingEntry {
    /// One fact fills one field
    Single { fact: FactRef, target_field: FieldRef },
    /// Several facts jointly fill one field, in declared order
    Combined {
        facts: Vec<FactRef>,
        target_field: FieldRef,
        joiner: Joiner,
    },
    /// One segment of a fact fills one field
    Split {
        fact: FactRef,
        target_field: FieldRef,
        part: SplitPart,
    },
    /// A numbered variant repeats the value of an earlier field
    Mirrored {
        source_field: String,
        target_field: FieldRef,
    },
    Unmapped {
        target_field: FieldRef,
        reason: UnmappedReason,
    },
}

impl MappingEntry {
    pub fn target_field(&self) -> &FieldRef {
        match self {
            MappingEntry::Single { target_field, .. }
            | MappingEntry::Combined { target_field, .. }
            | MappingEntry::Split { target_field, .. }
            | MappingEntry::Mirrored { target_field, .. }
            | MappingEntry::Unmapped { target_field, .. } => target_field,
        }
    }

    pub fn is_accepted(&self) -> bool {
        !matches!(self, MappingEntry::Unmapped { .. })
    }

    /// Names of facts this entry spends (empty for mirrors and rejections)
    pub fn consumed_facts(&self) -> Vec<&str> {
        match self {
            MappingEntry::Single { fact, .. } | MappingEntry::Split { fact, .. } => {
                vec![fact.name.as_str()]
            }
            MappingEntry::Combined { facts, .. } => facts.iter().map(|f| f.name.as_str()).collect(),
            MappingEntry::Mirrored { .. } | MappingEntry::Unmapped { .. } => Vec::new(),
        }
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Why a field ended up in `missing_fields`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    NoCandidate,
    Ambiguous,
    LowConfidence,
    /// Value present but could not be coerced to the field's type
    Uncoercible,
    /// Mirrored field whose base field is itself missing
    MirrorSourceMissing,
}

impl From<&UnmappedReason> for MissingReason {
    fn from(reason: &UnmappedReason) -> Self {
        match reason {
            UnmappedReason::NoCandidate => MissingReason::NoCandidate,
            UnmappedReason::Ambiguous { .. } => MissingReason::Ambiguous,
            UnmappedReason::LowConfidence { .. } => MissingReason::LowConfidence,
        }
    }
}

impl std::fmt::Display for MissingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingReason::NoCandidate => write!(f, "no matching value found"),
            MissingReason::Ambiguous => write!(f, "several values could apply"),
            MissingReason::LowConfidence => write!(f, "value was read with low confidence"),
            MissingReason::Uncoercible => write!(f, "value does not fit the field type"),
            MissingReason::MirrorSourceMissing => write!(f, "the field it repeats is missing"),
        }
    }
}

/// A field awaiting human completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingField {
    pub name: String,
    pub reason: MissingReason,
    pub required: bool,
}

/// Where a filled value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSource {
    Extracted { facts: Vec<String> },
    Mirrored { from: String },
    /// Entered by a person; `replaced` is the automatic value it superseded
    Human { replaced: Option<String> },
}

/// Terminal artifact of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillResult {
    pub(crate) filled_fields: BTreeMap<String, String>,
    /// In form field order
    pub(crate) missing_fields: Vec<MissingField>,
    pub(crate) mappings: Vec<MappingEntry>,
    pub(crate) provenance: BTreeMap<String, FieldSource>,
}

impl FillResult {
    pub fn filled_fields(&self) -> &BTreeMap<String, String> {
        &self.filled_fields
    }

    pub fn missing_fields(&self) -> &[MissingField] {
        &self.missing_fields
    }

    pub fn mappings(&self) -> &[MappingEntry] {
        &self.mappings
    }

    pub fn provenance(&self) -> &BTreeMap<String, FieldSource> {
        &self.provenance
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.filled_fields.get(field).map(String::as_str)
    }

    pub fn missing_reason(&self, field: &str) -> Option<MissingReason> {
        self.missing_fields
            .iter()
            .find(|m| m.name == field)
            .map(|m| m.reason)
    }

    pub fn is_missing(&self, field: &str) -> bool {
        self.missing_reason(field).is_some()
    }

    pub fn missing_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.missing_fields.iter().map(|m| m.name.as_str())
    }

    /// Required fields a person still has to fill in
    pub fn missing_required(&self) -> Vec<&str> {
        self.missing_fields
            .iter()
            .filter(|m| m.required)
            .map(|m| m.name.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }
}

/// Who supplied an override
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideSource {
    #[default]
    Human,
}

/// A human-entered correction for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub field: String,
    pub value: String,
    #[serde(default)]
    pub source: OverrideSource,
}

impl Override {
    pub fn human(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            source: OverrideSource::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_set_last_wins_keeps_position() {
        let set: FactSet = vec![
            ExtractedFact::new("first_name", "Ana"),
            ExtractedFact::new("last_name", "Cruz"),
            ExtractedFact::new("first_name", "Anna").with_confidence(0.7),
        ]
        .into();

        assert_eq!(set.len(), 2);
        let names: Vec<_> = set.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["first_name", "last_name"]);
        assert_eq!(set.get("first_name").unwrap().raw_value, "Anna");
        assert_eq!(set.get("first_name").unwrap().confidence, 0.7);
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(ExtractedFact::new("a", "b").with_confidence(1.7).confidence, 1.0);
        assert_eq!(ExtractedFact::new("a", "b").with_confidence(-0.2).confidence, 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
    }

    #[test]
    fn test_fact_confidence_defaults_when_absent() {
        let fact: ExtractedFact =
            serde_json::from_str(r#"{"name": "dob", "raw_value": "1990-05-01"}"#).unwrap();
        assert_eq!(fact.confidence, 1.0);
    }

    #[test]
    fn test_mapping_entry_tagged_serialization() {
        let entry = MappingEntry::Unmapped {
            target_field: FieldRef::from(&FormField::new("name")),
            reason: UnmappedReason::Ambiguous {
                candidates: vec!["nickname".into(), "first_name".into()],
            },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "unmapped");
        assert_eq!(json["reason"]["kind"], "ambiguous");
        assert_eq!(json["target_field"]["name"], "name");
    }

    #[test]
    fn test_joiner_from_config() {
        assert_eq!(Joiner::from_config("space"), Joiner::Space);
        assert_eq!(Joiner::from_config("concat"), Joiner::Concat);
        assert_eq!(Joiner::from_config(", "), Joiner::Custom(", ".into()));
        assert_eq!(Joiner::from_config(", ").separator(), ", ");
    }

    #[test]
    fn test_split_selector_from_config() {
        assert_eq!(SplitSelector::from_config("first"), Some(SplitSelector::First));
        assert_eq!(SplitSelector::from_config("2"), Some(SplitSelector::Index(2)));
        assert_eq!(SplitSelector::from_config("middle"), None);
    }
}
