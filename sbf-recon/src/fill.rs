// Fill Engine - Apply Mappings, Diff Filled vs Missing
//
// Concept: Turns the resolver trace into final field values. Every value is
// run through the light transform its field's type hint asks for; a value
// that cannot be coerced is treated as missing rather than written wrong.
//
// Never fails and never touches the facts: the trace carries snapshots.

use crate::types::{
    FieldSource, FillResult, MappingEntry, MissingField, MissingReason, Separator, SplitPart,
    SplitSelector, TypeHint,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

/// Input date formats, tried in order
const DATE_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Applies resolver output to produce a [`FillResult`]
#[derive(Debug, Clone)]
pub struct FillEngine {
    date_output_format: String,
}

impl Default for FillEngine {
    fn default() -> Self {
        Self::new(crate::rules::DEFAULT_DATE_OUTPUT_FORMAT)
    }
}

impl FillEngine {
    pub fn new(date_output_format: impl Into<String>) -> Self {
        Self {
            date_output_format: date_output_format.into(),
        }
    }

    /// Apply mappings in order; the full trace is kept in the result
    pub fn fill(&self, mappings: &[MappingEntry]) -> FillResult {
        let mut filled_fields: BTreeMap<String, String> = BTreeMap::new();
        let mut provenance: BTreeMap<String, FieldSource> = BTreeMap::new();
        let mut missing_fields: Vec<MissingField> = Vec::new();

        for entry in mappings {
            let target = entry.target_field();
            let outcome = match entry {
                MappingEntry::Single { fact, .. } => self
                    .coerce(&fact.raw_value, target.type_hint)
                    .map(|value| {
                        (
                            value,
                            FieldSource::Extracted {
                                facts: vec![fact.name.clone()],
                            },
                        )
                    }),
                MappingEntry::Combined { facts, joiner, .. } => {
                    let joined = facts
                        .iter()
                        .map(|f| f.raw_value.trim())
                        .filter(|v| !v.is_empty())
                        .collect::<Vec<_>>()
                        .join(joiner.separator());
                    self.coerce(&joined, target.type_hint).map(|value| {
                        (
                            value,
                            FieldSource::Extracted {
                                facts: facts.iter().map(|f| f.name.clone()).collect(),
                            },
                        )
                    })
                }
                MappingEntry::Split { fact, part, .. } => select_part(&fact.raw_value, part)
                    .ok_or(MissingReason::Uncoercible)
                    .and_then(|segment| self.coerce(&segment, target.type_hint))
                    .map(|value| {
                        (
                            value,
                            FieldSource::Extracted {
                                facts: vec![fact.name.clone()],
                            },
                        )
                    }),
                MappingEntry::Mirrored { source_field, .. } => filled_fields
                    .get(source_field)
                    .ok_or(MissingReason::MirrorSourceMissing)
                    .and_then(|value| self.coerce(value, target.type_hint))
                    .map(|value| {
                        (
                            value,
                            FieldSource::Mirrored {
                                from: source_field.clone(),
                            },
                        )
                    }),
                MappingEntry::Unmapped { reason, .. } => Err(MissingReason::from(reason)),
            };

            match outcome {
                Ok((value, source)) => {
                    missing_fields.retain(|m| m.name != target.name);
                    filled_fields.insert(target.name.clone(), value);
                    provenance.insert(target.name.clone(), source);
                }
                Err(reason) => {
                    debug!(field = %target.name, %reason, "Field left missing");
                    filled_fields.remove(&target.name);
                    provenance.remove(&target.name);
                    missing_fields.retain(|m| m.name != target.name);
                    missing_fields.push(MissingField {
                        name: target.name.clone(),
                        reason,
                        required: target.required,
                    });
                }
            }
        }

        info!(
            filled = filled_fields.len(),
            missing = missing_fields.len(),
            "Fill complete"
        );

        FillResult {
            filled_fields,
            missing_fields,
            mappings: mappings.to_vec(),
            provenance,
        }
    }

    /// Light transform driven by the field's type hint
    fn coerce(&self, raw: &str, type_hint: TypeHint) -> Result<String, MissingReason> {
        let value = collapse_whitespace(raw);
        if value.is_empty() {
            return Err(MissingReason::Uncoercible);
        }
        match type_hint {
            TypeHint::Text | TypeHint::Unknown => Ok(value),
            TypeHint::Date => {
                let date = parse_date(&value).ok_or(MissingReason::Uncoercible)?;
                let mut rendered = String::new();
                if write!(rendered, "{}", date.format(&self.date_output_format)).is_err() {
                    warn!(
                        format = %self.date_output_format,
                        "Invalid date output format; date left missing"
                    );
                    return Err(MissingReason::Uncoercible);
                }
                Ok(rendered)
            }
            TypeHint::Number => normalize_number(&value).ok_or(MissingReason::Uncoercible),
        }
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Strip spaces and thousands separators; the rest must be a plain decimal
fn normalize_number(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let plain = cleaned
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')));
    if !plain {
        return None;
    }
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(cleaned),
        _ => None,
    }
}

/// The segment(s) of a split source a field receives
fn select_part(raw: &str, part: &SplitPart) -> Option<String> {
    let (segments, glue): (Vec<&str>, &str) = match &part.separator {
        Separator::Whitespace => (raw.split_whitespace().collect(), " "),
        Separator::Text(sep) => (
            raw.split(sep.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect(),
            sep.as_str(),
        ),
    };

    match part.select {
        SplitSelector::First => segments.first().map(|s| s.to_string()),
        // A single segment belongs to `First`, never to `Last` as well
        SplitSelector::Last if segments.len() >= 2 => segments.last().map(|s| s.to_string()),
        SplitSelector::Last => None,
        SplitSelector::Inner if segments.len() > 2 => {
            Some(segments[1..segments.len() - 1].join(glue))
        }
        SplitSelector::Inner => None,
        SplitSelector::Index(n) => segments.get(n).map(|s| s.to_string()),
    }
}
