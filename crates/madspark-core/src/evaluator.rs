//! Multi-Dimensional Evaluator
//!
//! An optional second scoring pass (§4.G) that rates every idea across the
//! seven fixed dimensions in a single batch call, independent of the
//! critic's pass/fail score from `evaluate_ideas`. A per-item parse failure
//! keeps the idea at its base critic score rather than aborting the batch.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::agents::AgentOperations;
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::model::{DimensionScores, DimensionWeights, Evaluation, Idea};
use crate::retry::AgentKind;
use crate::schema::SchemaId;

/// Thin wrapper over `AgentOperations`'s shared call path, specialized for
/// the dimension-scoring contract.
pub struct MultiDimEvaluator {
    agents: Arc<AgentOperations>,
    config: Arc<WorkflowConfig>,
}

impl MultiDimEvaluator {
    pub fn new(agents: Arc<AgentOperations>, config: Arc<WorkflowConfig>) -> Self {
        Self { agents, config }
    }

    /// Score every idea across feasibility/innovation/impact/cost_effectiveness/
    /// scalability/safety/timeline. Falls back to a neutral score derived from
    /// the idea's base critique score when the provider omits an item.
    pub async fn score_ideas(
        &self,
        ideas: &[Idea],
        evaluations: &[Evaluation],
        topic: &str,
        context: &str,
        deadline: Instant,
    ) -> Result<(Vec<DimensionScores>, Vec<String>)> {
        let payload_items: Vec<Value> = ideas
            .iter()
            .enumerate()
            .map(|(i, idea)| {
                json!({
                    "idea_index": i,
                    "text": idea.text,
                    "base_score": evaluations.get(i).map(|e| e.score).unwrap_or(0.0),
                })
            })
            .collect();
        let prompt = json!({ "topic": topic, "context": context, "items": payload_items }).to_string();
        let system = "Score each idea from 0 to 10 on feasibility, innovation, impact, \
                      cost_effectiveness, scalability, risk, and timeline.";

        let value = self
            .agents
            .call_for(AgentKind::MultiDimEval, SchemaId::DimensionScores, system, &prompt, 0.3, deadline)
            .await?;

        let items = value.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        let mut scores = Vec::with_capacity(ideas.len());
        let mut warnings = Vec::new();

        for (i, idea) in ideas.iter().enumerate() {
            let found = items
                .iter()
                .find(|item| item.get("idea_index").and_then(Value::as_u64) == Some(i as u64));

            match found {
                Some(item) => scores.push(DimensionScores::new(
                    item.get("feasibility").and_then(Value::as_f64).unwrap_or(5.0),
                    item.get("innovation").and_then(Value::as_f64).unwrap_or(5.0),
                    item.get("impact").and_then(Value::as_f64).unwrap_or(5.0),
                    item.get("cost_effectiveness").and_then(Value::as_f64).unwrap_or(5.0),
                    item.get("scalability").and_then(Value::as_f64).unwrap_or(5.0),
                    item.get("risk").and_then(Value::as_f64).unwrap_or(5.0),
                    item.get("timeline").and_then(Value::as_f64).unwrap_or(5.0),
                )),
                None => {
                    warnings.push(format!("dimension scores missing for idea {}; using base score", idea.id));
                    let base = evaluations.get(i).map(|e| e.score).unwrap_or(5.0);
                    scores.push(DimensionScores::new(base, base, base, base, base, 10.0 - base, base));
                }
            }
        }

        Ok((scores, warnings))
    }

    pub fn weights(&self) -> DimensionWeights {
        self.config.dimension_weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use crate::model::Idea;
    use crate::monitor::Monitor;
    use std::time::Duration;

    fn harness() -> (Arc<AgentOperations>, Arc<WorkflowConfig>) {
        let config = Arc::new(WorkflowConfig::default());
        let agents = Arc::new(AgentOperations::new(
            Arc::new(MockProvider::new()),
            None,
            Arc::new(Monitor::new()),
            config.clone(),
        ));
        (agents, config)
    }

    fn far_future() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn scores_every_idea_with_seven_dimensions() {
        let (agents, config) = harness();
        let evaluator = MultiDimEvaluator::new(agents, config);
        let ideas = vec![Idea::new("a", "idea a", 0), Idea::new("b", "idea b", 1)];
        let evaluations = vec![Evaluation::placeholder("a"), Evaluation::placeholder("b")];

        let (scores, warnings) = evaluator
            .score_ideas(&ideas, &evaluations, "topic", "context", far_future())
            .await
            .unwrap();

        assert_eq!(scores.len(), 2);
        assert!(warnings.is_empty());
        for score in &scores {
            assert!(score.safety >= 0.0 && score.safety <= 10.0);
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        let (agents, config) = harness();
        let evaluator = MultiDimEvaluator::new(agents, config);
        let weights = evaluator.weights();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }
}
