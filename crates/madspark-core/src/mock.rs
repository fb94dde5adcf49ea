//! Mock Provider
//!
//! Deterministic `ProviderPort` implementation for offline/test use,
//! mirroring the deterministic fixture table this crate's ancestor used for
//! its mock exchange client: no network call, no randomness, same output
//! for the same input every time. Zero latency and zero tokens per call.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::{Result, WorkflowError};
use crate::provider::{GenerationRequest, ProviderPort, Usage};
use crate::schema::SchemaId;

fn hashed_prefix(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

/// One canned response, keyed by schema id and a hashed prefix of the
/// prompt that requested it.
type FixtureKey = (&'static str, String);

/// Deterministic `ProviderPort` with an optional fixture table. Calls that
/// miss the table fall back to a schema-aware synthetic generator derived
/// from the prompt's own `items`/`count` fields, so whole pipelines run
/// without registering a fixture for every single call.
pub struct MockProvider {
    fixtures: Mutex<HashMap<FixtureKey, Value>>,
    /// Prompts on which `generate_structured` should fail with
    /// `ProviderUnavailable`, used to drive forced-degradation test
    /// scenarios (e.g. S4's advocate-always-unavailable).
    force_unavailable: Mutex<Vec<SchemaId>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            fixtures: Mutex::new(HashMap::new()),
            force_unavailable: Mutex::new(Vec::new()),
        }
    }

    /// Register a canned response for a specific schema + prompt prefix.
    pub fn with_fixture(self, schema: SchemaId, prompt_prefix: &str, response: Value) -> Self {
        self.fixtures
            .lock()
            .unwrap()
            .insert((schema.as_str(), hashed_prefix(prompt_prefix)), response);
        self
    }

    /// Force every call for `schema` to fail with `ProviderUnavailable`,
    /// regardless of retry attempts — used to simulate a stage that never
    /// recovers.
    pub fn fail_schema(self, schema: SchemaId) -> Self {
        self.force_unavailable.lock().unwrap().push(schema);
        self
    }

    fn is_forced_unavailable(&self, schema: SchemaId) -> bool {
        self.force_unavailable.lock().unwrap().contains(&schema)
    }

    fn lookup(&self, schema: SchemaId, prompt: &str) -> Option<Value> {
        self.fixtures
            .lock()
            .unwrap()
            .get(&(schema.as_str(), hashed_prefix(prompt)))
            .cloned()
    }

    /// Synthesize a plausible batch response from the prompt payload's own
    /// `items`/`count`, deterministic in the item's index and content.
    fn synthesize(&self, schema: SchemaId, prompt: &str) -> Value {
        let payload: Value = serde_json::from_str(prompt).unwrap_or(Value::Null);

        match schema {
            SchemaId::Idea => {
                let count = payload.get("count").and_then(Value::as_u64).unwrap_or(1);
                let topic = payload.get("topic").and_then(Value::as_str).unwrap_or("idea");
                let items: Vec<Value> = (0..count)
                    .map(|i| json!({ "text": format!("{topic} concept #{i}"), "order_index": i }))
                    .collect();
                json!({ "items": items })
            }
            _ => {
                let items = payload
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let out: Vec<Value> = items
                    .iter()
                    .map(|item| self.synthesize_item(schema, item))
                    .collect();
                json!({ "items": out })
            }
        }
    }

    fn synthesize_item(&self, schema: SchemaId, item: &Value) -> Value {
        let idea_index = item.get("idea_index").cloned().unwrap_or(json!(0));
        match schema {
            SchemaId::Evaluation => json!({
                "idea_index": idea_index,
                "score": 6.0,
                "critique": "Plausible but needs more detail.",
                "strengths": ["clear value proposition"],
                "weaknesses": ["unclear cost model"],
                "suggestions": ["add a pilot plan"],
            }),
            SchemaId::Advocacy => json!({
                "idea_index": idea_index,
                "strengths": [{"title": "Low barrier to entry", "description": "Can start small."}],
                "opportunities": [{"title": "Partnerships", "description": "Local co-ops could fund a pilot."}],
                "addressing_concerns": [],
            }),
            SchemaId::Skepticism => json!({
                "idea_index": idea_index,
                "flaws": [{"title": "Scale risk", "description": "May not generalize beyond a pilot."}],
                "risks": [],
                "questionable_assumptions": [],
                "missing_considerations": [],
            }),
            SchemaId::Improvement => {
                let original = item.get("text").and_then(Value::as_str).unwrap_or("");
                json!({
                    "idea_index": idea_index,
                    "improved_text": format!("{original}, refined with a phased rollout plan"),
                    "rationale": "Addresses the scale risk raised in review.",
                })
            }
            SchemaId::DimensionScores => json!({
                "idea_index": idea_index,
                "feasibility": 6.0,
                "innovation": 6.0,
                "impact": 6.0,
                "cost_effectiveness": 6.0,
                "scalability": 6.0,
                "risk": 4.0,
                "timeline": 6.0,
            }),
            SchemaId::Inference => json!({
                "idea_index": idea_index,
                "inference_chain": ["If adopted locally, it reduces waste.", "Reduced waste lowers operating cost."],
                "conclusion": "Likely net-positive if piloted at small scale first.",
                "confidence": 0.7,
                "suggestions": ["Validate with a 90-day pilot."],
            }),
            SchemaId::Idea => unreachable!("Idea schema is synthesized at the batch level"),
        }
    }
}

#[async_trait]
impl ProviderPort for MockProvider {
    async fn generate_structured(
        &self,
        request: GenerationRequest<'_>,
        schema_id: SchemaId,
    ) -> Result<(Value, Usage)> {
        if self.is_forced_unavailable(schema_id) {
            return Err(WorkflowError::ProviderUnavailable(format!(
                "mock provider configured to always fail {}",
                schema_id.as_str()
            )));
        }

        let value = self
            .lookup(schema_id, request.prompt)
            .unwrap_or_else(|| self.synthesize(schema_id, request.prompt));

        Ok((value, Usage { tokens: 0, latency_ms: 0, cost: 0.0, cached: false }))
    }

    async fn generate_text(&self, request: GenerationRequest<'_>) -> Result<(String, Usage)> {
        Ok((
            format!("mock response to: {}", request.prompt),
            Usage { tokens: 0, latency_ms: 0, cost: 0.0, cached: false },
        ))
    }

    async fn health(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-v1"
    }

    fn supports_attachments(&self) -> bool {
        false
    }

    fn cost_per_token(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn synthesizes_ideas_from_count() {
        let provider = MockProvider::new();
        let prompt = json!({ "topic": "urban farming", "count": 3 }).to_string();
        let request = GenerationRequest {
            prompt: &prompt,
            system_instruction: "generate ideas",
            temperature: 0.9,
            token_budget: 256,
            attachments: None,
        };

        let (value, usage) = provider.generate_structured(request, SchemaId::Idea).await.unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 3);
        assert_eq!(usage.tokens, 0);
        assert!(!usage.cached);
    }

    #[tokio::test]
    async fn registered_fixture_overrides_synthesis() {
        let provider = MockProvider::new().with_fixture(
            SchemaId::Evaluation,
            "exact prompt",
            json!({ "items": [{"idea_index": 0, "score": 9.0, "critique": "great"}] }),
        );
        let request = GenerationRequest {
            prompt: "exact prompt",
            system_instruction: "",
            temperature: 0.0,
            token_budget: 64,
            attachments: None,
        };

        let (value, _) = provider.generate_structured(request, SchemaId::Evaluation).await.unwrap();
        assert_eq!(value["items"][0]["score"], json!(9.0));
    }

    #[tokio::test]
    async fn forced_failure_schema_always_errors() {
        let provider = MockProvider::new().fail_schema(SchemaId::Advocacy);
        let request = GenerationRequest {
            prompt: "{}",
            system_instruction: "",
            temperature: 0.5,
            token_budget: 64,
            attachments: None,
        };

        let err = provider.generate_structured(request, SchemaId::Advocacy).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn determinism_same_prompt_same_output() {
        let provider = MockProvider::new();
        let prompt = json!({ "items": [{"idea_index": 0, "text": "idea"}] }).to_string();
        let request = || GenerationRequest {
            prompt: &prompt,
            system_instruction: "",
            temperature: 0.3,
            token_budget: 64,
            attachments: None,
        };

        let (a, _) = provider.generate_structured(request(), SchemaId::Evaluation).await.unwrap();
        let (b, _) = provider.generate_structured(request(), SchemaId::Evaluation).await.unwrap();
        assert_eq!(a, b);
    }
}
