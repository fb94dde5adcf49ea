//! Logical Inference Engine
//!
//! An optional structured-reasoning pass (§4.H) producing an explicit
//! inference chain, conclusion, and confidence for each idea. A total
//! provider failure degrades the whole batch to low-confidence placeholders
//! with a warning rather than failing the workflow.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::agents::AgentOperations;
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::model::{Idea, InferenceKind, InferenceResult};
use crate::retry::AgentKind;
use crate::schema::SchemaId;

pub struct InferenceEngine {
    agents: Arc<AgentOperations>,
    config: Arc<WorkflowConfig>,
}

impl InferenceEngine {
    pub fn new(agents: Arc<AgentOperations>, config: Arc<WorkflowConfig>) -> Self {
        Self { agents, config }
    }

    /// Run one `kind` of structured reasoning over every idea in a single
    /// batch call. `FULL` is the default when the caller doesn't narrow it.
    pub async fn infer(
        &self,
        ideas: &[Idea],
        kind: InferenceKind,
        topic: &str,
        context: &str,
        deadline: Instant,
    ) -> Result<(Vec<InferenceResult>, Vec<String>)> {
        let payload_items: Vec<Value> = ideas
            .iter()
            .enumerate()
            .map(|(i, idea)| json!({ "idea_index": i, "text": idea.text }))
            .collect();
        let prompt = json!({
            "topic": topic,
            "context": context,
            "inference_kind": kind,
            "items": payload_items,
        })
        .to_string();
        let system = Self::system_instruction(kind);

        let result = self
            .agents
            .call_for(AgentKind::Inference, SchemaId::Inference, system, &prompt, 0.3, deadline)
            .await;

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                let warning = format!("logical inference unavailable, degrading to low-confidence placeholders: {err}");
                return Ok((
                    ideas
                        .iter()
                        .map(|idea| {
                            InferenceResult::new(idea.id.clone(), Vec::new(), "No inference available.", 0.0, Vec::new(), kind)
                        })
                        .collect(),
                    vec![warning],
                ));
            }
        };

        let items = value.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        let mut results = Vec::with_capacity(ideas.len());
        let mut warnings = Vec::new();

        for (i, idea) in ideas.iter().enumerate() {
            let found = items
                .iter()
                .find(|item| item.get("idea_index").and_then(Value::as_u64) == Some(i as u64));

            let inference = match found {
                Some(item) => InferenceResult::new(
                    idea.id.clone(),
                    item.get("inference_chain")
                        .and_then(Value::as_array)
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default(),
                    item.get("conclusion").and_then(Value::as_str).unwrap_or_default(),
                    item.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
                    item.get("suggestions")
                        .and_then(Value::as_array)
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default(),
                    kind,
                ),
                None => {
                    warnings.push(format!("inference missing for idea {}", idea.id));
                    InferenceResult::new(idea.id.clone(), Vec::new(), "No inference available.", 0.0, Vec::new(), kind)
                }
            };

            if inference.low_confidence(self.config.logical_confidence_threshold) {
                warnings.push(format!(
                    "inference for idea {} is below the confidence threshold ({:.2})",
                    idea.id, inference.confidence
                ));
            }

            results.push(inference);
        }

        Ok((results, warnings))
    }

    fn system_instruction(kind: InferenceKind) -> &'static str {
        match kind {
            InferenceKind::Full => {
                "Reason step by step about each idea: causal effects, constraints, \
                 contradictions, and implications. Produce an inference chain, a \
                 conclusion, and a confidence in [0, 1]."
            }
            InferenceKind::Causal => "Trace the causal chain of effects each idea would set off.",
            InferenceKind::Constraints => "Identify the hard constraints each idea must satisfy to work.",
            InferenceKind::Contradiction => "Identify any internal contradictions in each idea's premises.",
            InferenceKind::Implications => "Identify second-order implications each idea would have if adopted.",
        }
    }
}
