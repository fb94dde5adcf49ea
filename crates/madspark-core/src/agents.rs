//! Agent Operations
//!
//! The five typed operations built on top of the Provider Port. Each has a
//! single-item convenience wrapper and a batch form; the orchestrator uses
//! the batch form exclusively so an N-idea pipeline still issues O(1)
//! provider calls per stage (§8 property 7).

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::warn;

use crate::cache::{cache_key, CachedResponse, ResponseCache};
use crate::config::WorkflowConfig;
use crate::model::{AdvocacyBlock, ConcernResponse, Evaluation, Idea, Improvement, SkepticismBlock, TitledPoint};
use crate::monitor::Monitor;
use crate::novelty::fingerprint;
use crate::provider::{GenerationRequest, ProviderPort};
use crate::retry::{with_retry, AgentKind};
use crate::schema::{SchemaId, SchemaRegistry};
use crate::error::Result;

const DEFAULT_TOKEN_BUDGET: u32 = 2048;

/// Bundles the collaborators every agent operation needs: the provider to
/// call through, the optional response cache, and the monitor every call
/// reports to. Constructed once per workflow run by the orchestrator.
pub struct AgentOperations {
    provider: Arc<dyn ProviderPort>,
    cache: Option<Arc<dyn ResponseCache>>,
    monitor: Arc<Monitor>,
    config: Arc<WorkflowConfig>,
    registry: SchemaRegistry,
}

impl AgentOperations {
    pub fn new(
        provider: Arc<dyn ProviderPort>,
        cache: Option<Arc<dyn ResponseCache>>,
        monitor: Arc<Monitor>,
        config: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            provider,
            cache,
            monitor,
            config,
            registry: SchemaRegistry::new(),
        }
    }

    /// Issue one structured-output call through the cache and retry
    /// supervisor, recording usage against `agent` either way. Exposed at
    /// crate visibility so the multi-dimensional evaluator and inference
    /// engine share the same cache/retry/monitor path instead of
    /// duplicating it.
    pub(crate) async fn call_for(
        &self,
        agent: AgentKind,
        schema_id: SchemaId,
        system_instruction: &str,
        prompt: &str,
        temperature: f32,
        deadline: Instant,
    ) -> Result<Value> {
        let key = if self.config.cache_enabled {
            Some(cache_key(schema_id, self.provider.model(), temperature, system_instruction, prompt))
        } else {
            None
        };

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key).await {
                self.monitor.record_call(agent, &hit.usage);
                return Ok(hit.value);
            }
        }

        let policy = self.config.retry_policy(agent);
        let monitor = &self.monitor;
        let provider = &self.provider;

        let (value, usage) = with_retry(
            &policy,
            deadline,
            || monitor.record_retry(agent),
            || async {
                let request = GenerationRequest {
                    prompt,
                    system_instruction,
                    temperature,
                    token_budget: DEFAULT_TOKEN_BUDGET,
                    attachments: None,
                };
                provider.generate_structured(request, schema_id).await
            },
        )
        .await?;

        self.monitor.record_call(agent, &usage);

        let (items, validation_warnings) = self.registry.validate_batch_value(value, schema_id)?;
        for warning in &validation_warnings {
            warn!(agent = agent.as_str(), schema = schema_id.as_str(), "{warning}");
        }
        let value = json!({ "items": items });

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache
                .put(
                    key,
                    CachedResponse {
                        value: value.clone(),
                        usage,
                    },
                )
                .await;
        }

        Ok(value)
    }

    fn items_of(value: &Value) -> Vec<Value> {
        value.get("items").and_then(Value::as_array).cloned().unwrap_or_default()
    }

    fn item_at(items: &[Value], index: usize) -> Option<&Value> {
        items.iter().find(|item| item.get("idea_index").and_then(Value::as_u64) == Some(index as u64))
    }

    fn titled_points(value: &Value, field: &str) -> Vec<TitledPoint> {
        value
            .get(field)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|p| TitledPoint {
                        title: p.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
                        description: p.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn string_list(value: &Value, field: &str) -> Vec<String> {
        value
            .get(field)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    /// `generate_ideas(topic, context, num_ideas, temperature) -> list<Idea>`.
    /// Returns exactly `num_ideas` or fewer with a warning (§4.F).
    pub async fn generate_ideas(
        &self,
        topic: &str,
        context: &str,
        num_ideas: u32,
        temperature: f32,
        deadline: Instant,
    ) -> Result<(Vec<Idea>, Vec<String>)> {
        let prompt = json!({ "topic": topic, "context": context, "count": num_ideas }).to_string();
        let system = "You are an idea generator. Produce distinct, concrete ideas for the given \
                      topic and context. Respond as a JSON object with an `items` array of \
                      `{\"text\": string}` entries.";

        let value = self
            .call_for(AgentKind::Generator, SchemaId::Idea, system, &prompt, temperature, deadline)
            .await?;

        let items = Self::items_of(&value);
        let mut warnings = Vec::new();
        if (items.len() as u32) < num_ideas {
            warnings.push(format!(
                "idea generator returned {} of {num_ideas} requested ideas",
                items.len()
            ));
        }

        let ideas = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                item.get("text")
                    .and_then(Value::as_str)
                    .map(|text| Idea::new(fingerprint(text), text, i as u32))
            })
            .collect();

        Ok((ideas, warnings))
    }

    /// `evaluate_ideas(ideas, topic, context, temperature) -> list<Evaluation>`.
    pub async fn evaluate_ideas(
        &self,
        ideas: &[Idea],
        topic: &str,
        context: &str,
        temperature: f32,
        deadline: Instant,
    ) -> Result<(Vec<Evaluation>, Vec<String>)> {
        let payload_items: Vec<Value> = ideas
            .iter()
            .enumerate()
            .map(|(i, idea)| json!({ "idea_index": i, "text": idea.text }))
            .collect();
        let prompt = json!({ "topic": topic, "context": context, "items": payload_items }).to_string();
        let system = "You are a rigorous critic. Score each idea from 0 to 10 and explain why. \
                      Echo back the idea_index for every item.";

        let value = self
            .call_for(AgentKind::Critic, SchemaId::Evaluation, system, &prompt, temperature, deadline)
            .await?;
        let items = Self::items_of(&value);

        let mut evaluations = Vec::with_capacity(ideas.len());
        let mut warnings = Vec::new();
        for (i, idea) in ideas.iter().enumerate() {
            match Self::item_at(&items, i) {
                Some(item) => evaluations.push(Evaluation::new(
                    idea.id.clone(),
                    item.get("score").and_then(Value::as_f64).unwrap_or(0.0),
                    item.get("critique").and_then(Value::as_str).unwrap_or_default(),
                    Self::string_list(item, "strengths"),
                    Self::string_list(item, "weaknesses"),
                    Self::string_list(item, "suggestions"),
                )),
                None => {
                    warnings.push(format!("evaluation missing for idea {}", idea.id));
                    evaluations.push(Evaluation::placeholder(idea.id.clone()));
                }
            }
        }

        Ok((evaluations, warnings))
    }

    /// Single-item convenience wrapper over `evaluate_ideas`.
    pub async fn evaluate_idea(
        &self,
        idea: &Idea,
        topic: &str,
        context: &str,
        temperature: f32,
        deadline: Instant,
    ) -> Result<Evaluation> {
        let (mut evaluations, _warnings) = self.evaluate_ideas(std::slice::from_ref(idea), topic, context, temperature, deadline).await?;
        Ok(evaluations.pop().unwrap_or_else(|| Evaluation::placeholder(idea.id.clone())))
    }

    /// `advocate_ideas(ideas_with_evaluation, topic, context, temperature) -> list<AdvocacyBlock>`.
    pub async fn advocate_ideas(
        &self,
        ideas: &[Idea],
        evaluations: &[Evaluation],
        topic: &str,
        context: &str,
        temperature: f32,
        deadline: Instant,
    ) -> Result<(Vec<AdvocacyBlock>, Vec<String>)> {
        let payload_items: Vec<Value> = ideas
            .iter()
            .enumerate()
            .map(|(i, idea)| {
                let critique = evaluations.get(i).map(|e| e.critique.as_str()).unwrap_or_default();
                json!({ "idea_index": i, "text": idea.text, "critique": critique })
            })
            .collect();
        let prompt = json!({ "topic": topic, "context": context, "items": payload_items }).to_string();
        let system = "You are an advocate. Make the strongest honest case for each idea, \
                      addressing the critic's concerns directly.";

        let value = self
            .call_for(AgentKind::Advocate, SchemaId::Advocacy, system, &prompt, temperature, deadline)
            .await?;
        let items = Self::items_of(&value);

        let mut blocks = Vec::with_capacity(ideas.len());
        let mut warnings = Vec::new();
        for (i, idea) in ideas.iter().enumerate() {
            match Self::item_at(&items, i) {
                Some(item) => blocks.push(AdvocacyBlock {
                    idea_id: idea.id.clone(),
                    strengths: Self::titled_points(item, "strengths"),
                    opportunities: Self::titled_points(item, "opportunities"),
                    addressing_concerns: item
                        .get("addressing_concerns")
                        .and_then(Value::as_array)
                        .map(|arr| {
                            arr.iter()
                                .map(|c| ConcernResponse {
                                    concern: c.get("concern").and_then(Value::as_str).unwrap_or_default().to_string(),
                                    response: c.get("response").and_then(Value::as_str).unwrap_or_default().to_string(),
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                }),
                None => {
                    warnings.push(format!("advocacy missing for idea {}", idea.id));
                    blocks.push(AdvocacyBlock {
                        idea_id: idea.id.clone(),
                        ..Default::default()
                    });
                }
            }
        }

        Ok((blocks, warnings))
    }

    /// `skepticize_ideas(ideas_with_advocacy, topic, context, temperature) -> list<SkepticismBlock>`.
    /// Consumes the advocacy block per the canonical sequential policy (§4.I, §9 open question #1).
    pub async fn skepticize_ideas(
        &self,
        ideas: &[Idea],
        advocacy: &[AdvocacyBlock],
        topic: &str,
        context: &str,
        temperature: f32,
        deadline: Instant,
    ) -> Result<(Vec<SkepticismBlock>, Vec<String>)> {
        let payload_items: Vec<Value> = ideas
            .iter()
            .enumerate()
            .map(|(i, idea)| {
                let advocacy_summary = advocacy
                    .get(i)
                    .map(|a| a.strengths.iter().map(|s| s.title.clone()).collect::<Vec<_>>())
                    .unwrap_or_default();
                json!({ "idea_index": i, "text": idea.text, "advocacy_points": advocacy_summary })
            })
            .collect();
        let prompt = json!({ "topic": topic, "context": context, "items": payload_items }).to_string();
        let system = "You are a skeptic. Given the advocate's points, identify flaws, risks, \
                      questionable assumptions, and missing considerations.";

        let value = self
            .call_for(AgentKind::Skeptic, SchemaId::Skepticism, system, &prompt, temperature, deadline)
            .await?;
        let items = Self::items_of(&value);

        let mut blocks = Vec::with_capacity(ideas.len());
        let mut warnings = Vec::new();
        for (i, idea) in ideas.iter().enumerate() {
            match Self::item_at(&items, i) {
                Some(item) => blocks.push(SkepticismBlock {
                    idea_id: idea.id.clone(),
                    flaws: Self::titled_points(item, "flaws"),
                    risks: Self::titled_points(item, "risks"),
                    questionable_assumptions: Self::titled_points(item, "questionable_assumptions"),
                    missing_considerations: Self::titled_points(item, "missing_considerations"),
                }),
                None => {
                    warnings.push(format!("skepticism missing for idea {}", idea.id));
                    blocks.push(SkepticismBlock {
                        idea_id: idea.id.clone(),
                        ..Default::default()
                    });
                }
            }
        }

        Ok((blocks, warnings))
    }

    /// `improve_ideas(ideas_with_all_feedback, topic, context, temperature) -> list<Improvement>`.
    /// Missing items are filled as placeholders rather than retried in full
    /// (retrying would regenerate every item, §4.F).
    pub async fn improve_ideas(
        &self,
        ideas: &[Idea],
        evaluations: &[Evaluation],
        advocacy: &[AdvocacyBlock],
        skepticism: &[SkepticismBlock],
        topic: &str,
        context: &str,
        temperature: f32,
        deadline: Instant,
    ) -> Result<(Vec<Improvement>, Vec<String>)> {
        let payload_items: Vec<Value> = ideas
            .iter()
            .enumerate()
            .map(|(i, idea)| {
                json!({
                    "idea_index": i,
                    "text": idea.text,
                    "critique": evaluations.get(i).map(|e| e.critique.clone()).unwrap_or_default(),
                    "advocacy_strengths": advocacy.get(i).map(|a| a.strengths.len()).unwrap_or(0),
                    "skepticism_flaws": skepticism.get(i).map(|s| s.flaws.len()).unwrap_or(0),
                })
            })
            .collect();
        let prompt = json!({ "topic": topic, "context": context, "items": payload_items }).to_string();
        let system = "You are an improver. Rewrite each idea to address the critique, advocacy, \
                      and skepticism gathered so far.";

        let value = self
            .call_for(AgentKind::Improver, SchemaId::Improvement, system, &prompt, temperature, deadline)
            .await?;
        let items = Self::items_of(&value);

        let mut improvements = Vec::with_capacity(ideas.len());
        let mut warnings = Vec::new();
        for (i, idea) in ideas.iter().enumerate() {
            match Self::item_at(&items, i) {
                Some(item) => improvements.push(Improvement {
                    idea_id: idea.id.clone(),
                    improved_text: item.get("improved_text").and_then(Value::as_str).unwrap_or(&idea.text).to_string(),
                    rationale: item.get("rationale").and_then(Value::as_str).unwrap_or_default().to_string(),
                }),
                None => {
                    warnings.push(format!("improvement missing for idea {}; falling back to original", idea.id));
                    improvements.push(Improvement {
                        idea_id: idea.id.clone(),
                        improved_text: idea.text.clone(),
                        rationale: "No improvement could be generated; original idea retained.".into(),
                    });
                }
            }
        }

        Ok((improvements, warnings))
    }
}
