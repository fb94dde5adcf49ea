//! Schema Registry
//!
//! The single source of truth for the structured-output contracts every
//! agent operation asks the provider to honor. Each schema has a stable id,
//! a JSON Schema document a provider can be constrained against, and a
//! `validate` path that clamps numeric fields and rejects missing required
//! fields before the raw JSON is deserialized into a typed model.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{Result, WorkflowError};

/// Identifies one of the structured-output contracts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemaId {
    Idea,
    Evaluation,
    Advocacy,
    Skepticism,
    Improvement,
    DimensionScores,
    Inference,
}

impl SchemaId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaId::Idea => "idea",
            SchemaId::Evaluation => "evaluation",
            SchemaId::Advocacy => "advocacy",
            SchemaId::Skepticism => "skepticism",
            SchemaId::Improvement => "improvement",
            SchemaId::DimensionScores => "dimension_scores",
            SchemaId::Inference => "inference",
        }
    }

    fn required_fields(&self) -> &'static [&'static str] {
        match self {
            SchemaId::Idea => &["text"],
            SchemaId::Evaluation => &["idea_index", "score", "critique"],
            SchemaId::Advocacy => &["idea_index"],
            SchemaId::Skepticism => &["idea_index"],
            SchemaId::Improvement => &["idea_index", "improved_text"],
            SchemaId::DimensionScores => &[
                "idea_index",
                "feasibility",
                "innovation",
                "impact",
                "cost_effectiveness",
                "scalability",
                "risk",
                "timeline",
            ],
            SchemaId::Inference => &["idea_index", "conclusion", "confidence"],
        }
    }

    /// `(field, min, max)` triples clamped on `validate`.
    fn numeric_ranges(&self) -> &'static [(&'static str, f64, f64)] {
        match self {
            SchemaId::Evaluation => &[("score", 0.0, 10.0)],
            SchemaId::DimensionScores => &[
                ("feasibility", 0.0, 10.0),
                ("innovation", 0.0, 10.0),
                ("impact", 0.0, 10.0),
                ("cost_effectiveness", 0.0, 10.0),
                ("scalability", 0.0, 10.0),
                ("risk", 0.0, 10.0),
                ("timeline", 0.0, 10.0),
            ],
            SchemaId::Inference => &[("confidence", 0.0, 1.0)],
            _ => &[],
        }
    }

    /// JSON Schema document describing this contract's shape, suitable for
    /// handing to a provider that supports schema-constrained decoding.
    pub fn json_schema(&self) -> Value {
        let required = self.required_fields();
        json!({
            "type": "object",
            "required": required,
            "additionalProperties": true,
        })
    }
}

/// Holds the canonical contracts and validates raw provider output against
/// them. Stateless beyond the fixed set of schemas; safe to share behind an
/// `Arc` across concurrent callers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchemaRegistry;

impl SchemaRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Parse, validate, and clamp `raw` against `id`, returning the adjusted
    /// JSON value. Missing required fields raise `SchemaMismatch`; unknown
    /// fields are left in place (and ignored by downstream `serde` structs).
    pub fn validate(&self, raw: &str, id: SchemaId) -> Result<Value> {
        let value: Value = serde_json::from_str(raw).map_err(|e| WorkflowError::SchemaMismatch {
            schema: id.as_str().into(),
            reason: format!("invalid JSON: {e}"),
        })?;
        self.validate_value(value, id)
    }

    /// Validate then deserialize into a concrete type.
    pub fn validate_typed<T: DeserializeOwned>(&self, raw: &str, id: SchemaId) -> Result<T> {
        let value = self.validate(raw, id)?;
        serde_json::from_value(value).map_err(|e| WorkflowError::SchemaMismatch {
            schema: id.as_str().into(),
            reason: format!("type mismatch: {e}"),
        })
    }

    /// Validate a batch response: either a top-level JSON array, or an
    /// object with an `items` array. Each element is validated and clamped
    /// independently; elements that fail are dropped with a warning rather
    /// than failing the whole batch (§4.F/§4.G: a single bad item never
    /// aborts the others).
    pub fn validate_batch(&self, raw: &str, id: SchemaId) -> Result<(Vec<Value>, Vec<String>)> {
        let parsed: Value = serde_json::from_str(raw).map_err(|e| WorkflowError::SchemaMismatch {
            schema: id.as_str().into(),
            reason: format!("invalid JSON: {e}"),
        })?;
        self.validate_batch_value(parsed, id)
    }

    /// Same contract as `validate_batch`, for a provider that already hands
    /// back a parsed `Value` rather than a raw JSON string (every
    /// `ProviderPort::generate_structured` implementation does).
    pub fn validate_batch_value(&self, parsed: Value, id: SchemaId) -> Result<(Vec<Value>, Vec<String>)> {
        let items = match parsed {
            Value::Array(items) => items,
            Value::Object(ref obj) => match obj.get("items") {
                Some(Value::Array(items)) => items.clone(),
                _ => {
                    return Err(WorkflowError::SchemaMismatch {
                        schema: id.as_str().into(),
                        reason: "expected a JSON array or an object with an `items` array".into(),
                    })
                }
            },
            _ => {
                return Err(WorkflowError::SchemaMismatch {
                    schema: id.as_str().into(),
                    reason: "expected a JSON array or an object with an `items` array".into(),
                })
            }
        };

        let mut valid = Vec::with_capacity(items.len());
        let mut warnings = Vec::new();

        for (position, item) in items.into_iter().enumerate() {
            match self.validate_value(item, id) {
                Ok(value) => valid.push(value),
                Err(e) => warnings.push(format!("{} batch item {position} rejected: {e}", id.as_str())),
            }
        }

        Ok((valid, warnings))
    }

    fn validate_value(&self, mut value: Value, id: SchemaId) -> Result<Value> {
        let object = value.as_object().ok_or_else(|| WorkflowError::SchemaMismatch {
            schema: id.as_str().into(),
            reason: "expected a JSON object".into(),
        })?;

        for field in id.required_fields() {
            if !object.contains_key(*field) {
                return Err(WorkflowError::SchemaMismatch {
                    schema: id.as_str().into(),
                    reason: format!("missing required field `{field}`"),
                });
            }
        }

        if let Some(object) = value.as_object_mut() {
            for (field, min, max) in id.numeric_ranges() {
                if let Some(n) = object.get(*field).and_then(Value::as_f64) {
                    let clamped = n.clamp(*min, *max);
                    object.insert((*field).to_string(), json!(clamped));
                }
            }
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_required_field() {
        let registry = SchemaRegistry::new();
        let err = registry
            .validate(r#"{"idea_index": 0}"#, SchemaId::Evaluation)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::SchemaMismatch { .. }));
    }

    #[test]
    fn clamps_out_of_range_score() {
        let registry = SchemaRegistry::new();
        let value = registry
            .validate(
                r#"{"idea_index": 0, "score": 42.0, "critique": "nice"}"#,
                SchemaId::Evaluation,
            )
            .unwrap();
        assert_eq!(value["score"], json!(10.0));
    }

    #[test]
    fn ignores_unknown_fields() {
        let registry = SchemaRegistry::new();
        let value = registry
            .validate(
                r#"{"idea_index": 0, "score": 5.0, "critique": "ok", "mystery": true}"#,
                SchemaId::Evaluation,
            )
            .unwrap();
        assert_eq!(value["mystery"], json!(true));
    }

    #[test]
    fn normalizes_risk_clamp_for_dimension_scores() {
        let registry = SchemaRegistry::new();
        let value = registry
            .validate(
                r#"{"idea_index":0,"feasibility":5,"innovation":5,"impact":5,
                     "cost_effectiveness":5,"scalability":5,"risk":99,"timeline":5}"#,
                SchemaId::DimensionScores,
            )
            .unwrap();
        assert_eq!(value["risk"], json!(10.0));
    }

    #[test]
    fn validate_batch_value_drops_bad_items_keeps_good_ones() {
        let registry = SchemaRegistry::new();
        let parsed = json!({
            "items": [
                {"idea_index": 0, "score": 7.0, "critique": "solid"},
                {"idea_index": 1},
            ]
        });
        let (valid, warnings) = registry.validate_batch_value(parsed, SchemaId::Evaluation).unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(warnings.len(), 1);
    }
}
