// JSON Adapters
//
// Boundary validation for the loosely-typed payloads around the engine:
// - extraction output from the vision model (name -> value, sometimes with
//   a confidence, sometimes with junk)
// - form schemas from the PDF form introspector ({"properties": {...}})
//
// Anything that is not a usable scalar is dropped here with a debug!
// diagnostic so the resolver only ever sees clean ExtractedFacts.

use super::{FactExtractor, FormWriter, SchemaSource};
use crate::error::{ExtractionError, SchemaError, WriteError};
use crate::types::{ExtractedFact, FactSet, FormField, TypeHint};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

// ============================================================================
// Extraction
// ============================================================================

/// Facts from a JSON extraction payload
///
/// Accepted shapes:
/// - `{"first_name": "Ana", "age": 34}`
/// - `{"first_name": {"value": "Ana", "confidence": 0.9}}`
/// - `[{"name": "first_name", "raw_value": "Ana", "confidence": 0.9}]`
///
/// A top-level `"error"` key means the extractor itself failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFactExtractor;

impl JsonFactExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(document: &[u8]) -> Result<FactSet, ExtractionError> {
        let payload: Value = serde_json::from_slice(document)
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        match payload {
            Value::Array(_) => {
                let facts: Vec<ExtractedFact> = serde_json::from_value(payload)
                    .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
                Ok(FactSet::from(facts))
            }
            Value::Object(object) => parse_object(object),
            other => Err(ExtractionError::Malformed(format!(
                "expected an object or array, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn parse_object(object: Map<String, Value>) -> Result<FactSet, ExtractionError> {
    if let Some(error) = object.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ExtractionError::Failed(message));
    }

    let mut facts = FactSet::new();
    for (name, value) in object {
        match fact_from_value(&name, &value) {
            Some(fact) => facts.insert(fact),
            None => debug!(fact = %name, kind = json_kind(&value), "Skipping unusable extraction entry"),
        }
    }
    Ok(facts)
}

fn fact_from_value(name: &str, value: &Value) -> Option<ExtractedFact> {
    if name.trim().is_empty() {
        return None;
    }
    match value {
        Value::Object(inner) => {
            let raw = scalar_text(inner.get("value")?)?;
            let confidence = inner.get("confidence").and_then(Value::as_f64).unwrap_or(1.0);
            Some(ExtractedFact::new(name, raw).with_confidence(confidence))
        }
        other => scalar_text(other).map(|raw| ExtractedFact::new(name, raw)),
    }
}

/// Strings, numbers and booleans as text; everything else is unusable
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl FactExtractor for JsonFactExtractor {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn extract(&self, document: &[u8]) -> Result<FactSet, ExtractionError> {
        Self::parse(document)
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Form fields from a JSON schema document
///
/// Accepted shapes:
/// - `{"properties": {"dob": {"type": "string", "format": "date"}}, "required": ["dob"]}`
/// - `["first_name", {"name": "dob", "type_hint": "date", "required": true}]`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaSource;

impl JsonSchemaSource {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(template: &[u8]) -> Result<Vec<FormField>, SchemaError> {
        let schema: Value =
            serde_json::from_slice(template).map_err(|e| SchemaError::Malformed(e.to_string()))?;

        let fields = match schema {
            Value::Object(object) => fields_from_properties(&object)?,
            Value::Array(items) => fields_from_list(items)?,
            other => {
                return Err(SchemaError::Malformed(format!(
                    "expected an object or array, got {}",
                    json_kind(&other)
                )))
            }
        };

        if fields.is_empty() {
            return Err(SchemaError::NoFields);
        }
        Ok(fields)
    }
}

fn fields_from_properties(object: &Map<String, Value>) -> Result<Vec<FormField>, SchemaError> {
    let properties = object
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::Malformed("missing \"properties\" object".to_string()))?;

    let required: HashSet<&str> = object
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    Ok(properties
        .iter()
        .map(|(name, property)| FormField {
            name: name.clone(),
            required: required.contains(name.as_str()),
            type_hint: type_hint_for(property),
        })
        .collect())
}

fn fields_from_list(items: Vec<Value>) -> Result<Vec<FormField>, SchemaError> {
    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(FormField::new(name)),
            other => serde_json::from_value(other).map_err(|e| SchemaError::Malformed(e.to_string())),
        })
        .collect()
}

/// JSON-Schema `type`/`format` to a type hint
fn type_hint_for(property: &Value) -> TypeHint {
    let format = property.get("format").and_then(Value::as_str);
    let kind = property.get("type").and_then(Value::as_str);
    match (kind, format) {
        (_, Some("date")) => TypeHint::Date,
        (Some("number"), _) | (Some("integer"), _) => TypeHint::Number,
        (Some("string"), _) => TypeHint::Text,
        _ => TypeHint::Unknown,
    }
}

#[async_trait]
impl SchemaSource for JsonSchemaSource {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn list_fields(&self, template: &[u8]) -> Result<Vec<FormField>, SchemaError> {
        Self::parse(template)
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Renders filled values as a pretty-printed JSON object
///
/// The template is not needed for JSON output; fields absent from the map
/// are simply absent from the output, as they stay blank on a PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormWriter;

impl JsonFormWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FormWriter for JsonFormWriter {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn write_values(
        &self,
        _template: &[u8],
        filled: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, WriteError> {
        serde_json::to_vec_pretty(filled).map_err(|e| {
            warn!(error = %e, "Failed to render filled values");
            WriteError(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_flat_object() {
        let doc = br#"{"first_name": "Ana", "age": 34, "is_voter": true, "photo": null}"#;
        let facts = JsonFactExtractor::new().extract(doc).await.unwrap();
        assert_eq!(facts.len(), 3);
        assert_eq!(facts.get("age").unwrap().raw_value, "34");
        assert_eq!(facts.get("is_voter").unwrap().raw_value, "true");
        assert_eq!(facts.get("first_name").unwrap().confidence, 1.0);
        assert!(facts.get("photo").is_none());
    }

    #[tokio::test]
    async fn test_extract_value_with_confidence() {
        let doc = br#"{"middle_name": {"value": "Reyes", "confidence": 0.2}, "address": {"street": "x"}}"#;
        let facts = JsonFactExtractor::new().extract(doc).await.unwrap();
        let fact = facts.get("middle_name").unwrap();
        assert_eq!(fact.raw_value, "Reyes");
        assert_eq!(fact.confidence, 0.2);
        // nested objects without a value are skipped
        assert!(facts.get("address").is_none());
    }

    #[tokio::test]
    async fn test_extract_array_form_clamps_confidence() {
        let doc = br#"[{"name": "dob", "raw_value": "May 1, 1990", "confidence": 1.4}]"#;
        let facts = JsonFactExtractor::new().extract(doc).await.unwrap();
        assert_eq!(facts.get("dob").unwrap().confidence, 1.0);
    }

    #[tokio::test]
    async fn test_extract_error_payload() {
        let doc = br#"{"error": "image too blurry"}"#;
        let result = JsonFactExtractor::new().extract(doc).await;
        assert!(matches!(result, Err(ExtractionError::Failed(msg)) if msg == "image too blurry"));
    }

    #[tokio::test]
    async fn test_extract_malformed() {
        let result = JsonFactExtractor::new().extract(b"not json").await;
        assert!(matches!(result, Err(ExtractionError::Malformed(_))));
        let result = JsonFactExtractor::new().extract(b"\"just a string\"").await;
        assert!(matches!(result, Err(ExtractionError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_schema_properties_in_declaration_order() {
        let template = br#"{
            "properties": {
                "last_name": {"type": "string"},
                "first_name": {"type": "string"},
                "dob": {"type": "string", "format": "date"},
                "age": {"type": "integer"},
                "is_voter": {"type": "boolean"}
            },
            "required": ["last_name", "dob"]
        }"#;
        let fields = JsonSchemaSource::new().list_fields(template).await.unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["last_name", "first_name", "dob", "age", "is_voter"]);
        assert!(fields[0].required);
        assert!(!fields[1].required);
        assert_eq!(fields[2].type_hint, TypeHint::Date);
        assert_eq!(fields[3].type_hint, TypeHint::Number);
        assert_eq!(fields[4].type_hint, TypeHint::Unknown);
    }

    #[tokio::test]
    async fn test_schema_list_form() {
        let template = br#"["first_name", {"name": "dob", "type_hint": "date", "required": true}]"#;
        let fields = JsonSchemaSource::new().list_fields(template).await.unwrap();
        assert_eq!(fields[0], FormField::new("first_name"));
        assert_eq!(fields[1], FormField::new("dob").with_type(TypeHint::Date).required());
    }

    #[tokio::test]
    async fn test_schema_without_fields() {
        let source = JsonSchemaSource::new();
        assert!(matches!(
            source.list_fields(br#"{"properties": {}}"#).await,
            Err(SchemaError::NoFields)
        ));
        assert!(matches!(source.list_fields(b"[]").await, Err(SchemaError::NoFields)));
        assert!(matches!(
            source.list_fields(br#"{"title": "Clearance"}"#).await,
            Err(SchemaError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_writer_renders_filled_values() {
        let mut filled = BTreeMap::new();
        filled.insert("full_name".to_string(), "Ana Cruz".to_string());
        let bytes = JsonFormWriter::new().write_values(b"", &filled).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["full_name"], "Ana Cruz");
    }
}
