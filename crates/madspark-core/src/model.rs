//! Data Model
//!
//! Entities produced and consumed by the workflow. Mirrors the JSON shapes
//! exposed at the external boundary (§6): candidates, usage summaries, and
//! the request/result envelope.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WorkflowError};

/// Stable identifier for one `run_workflow` invocation.
///
/// Used as the progress bus routing key and echoed back on `WorkflowResult`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.clamp(min, max)
}

/// A single generated idea. Immutable after creation; `id` is a content
/// fingerprint of `text`, not a random identifier, so identical text always
/// maps to the same id (determinism invariant, §8 property 5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    pub text: String,
    pub order_index: u32,
}

impl Idea {
    pub fn new(id: impl Into<String>, text: impl Into<String>, order_index: u32) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            order_index,
        }
    }
}

/// Critic output for one idea. `score` is clamped to `[0, 10]` on construction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Evaluation {
    pub idea_id: String,
    pub score: f64,
    pub critique: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Evaluation {
    pub fn new(
        idea_id: impl Into<String>,
        score: f64,
        critique: impl Into<String>,
        strengths: Vec<String>,
        weaknesses: Vec<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self {
            idea_id: idea_id.into(),
            score: clamp(score, 0.0, 10.0),
            critique: critique.into(),
            strengths,
            weaknesses,
            suggestions,
        }
    }

    /// Placeholder evaluation for an idea the provider never returned output for.
    pub fn placeholder(idea_id: impl Into<String>) -> Self {
        Self {
            idea_id: idea_id.into(),
            score: 0.0,
            critique: String::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

/// A titled point used throughout advocacy/skepticism blocks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TitledPoint {
    pub title: String,
    pub description: String,
}

/// A concern paired with the advocate's response to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConcernResponse {
    pub concern: String,
    pub response: String,
}

/// Advocate's case for an idea.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AdvocacyBlock {
    pub idea_id: String,
    #[serde(default)]
    pub strengths: Vec<TitledPoint>,
    #[serde(default)]
    pub opportunities: Vec<TitledPoint>,
    #[serde(default)]
    pub addressing_concerns: Vec<ConcernResponse>,
}

/// Skeptic's case against an idea, produced after consuming the advocacy block.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SkepticismBlock {
    pub idea_id: String,
    #[serde(default)]
    pub flaws: Vec<TitledPoint>,
    #[serde(default)]
    pub risks: Vec<TitledPoint>,
    #[serde(default)]
    pub questionable_assumptions: Vec<TitledPoint>,
    #[serde(default)]
    pub missing_considerations: Vec<TitledPoint>,
}

/// Improver's rewrite of an idea in light of evaluation, advocacy, and skepticism.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Improvement {
    pub idea_id: String,
    pub improved_text: String,
    pub rationale: String,
}

/// The seven fixed scoring dimensions. `safety` replaces the source's "risk"
/// dimension so higher is always better across every dimension.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DimensionScores {
    pub feasibility: f64,
    pub innovation: f64,
    pub impact: f64,
    pub cost_effectiveness: f64,
    pub scalability: f64,
    pub safety: f64,
    pub timeline: f64,
}

/// Per-dimension weights, must sum to 1.0 (validated by `WorkflowConfig`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub feasibility: f64,
    pub innovation: f64,
    pub impact: f64,
    pub cost_effectiveness: f64,
    pub scalability: f64,
    pub safety: f64,
    pub timeline: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        let w = 1.0 / 7.0;
        Self {
            feasibility: w,
            innovation: w,
            impact: w,
            cost_effectiveness: w,
            scalability: w,
            safety: w,
            timeline: w,
        }
    }
}

impl DimensionWeights {
    pub fn sum(&self) -> f64 {
        self.feasibility
            + self.innovation
            + self.impact
            + self.cost_effectiveness
            + self.scalability
            + self.safety
            + self.timeline
    }
}

impl DimensionScores {
    /// Build from raw values, clamping each dimension into `[0, 10]`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        feasibility: f64,
        innovation: f64,
        impact: f64,
        cost_effectiveness: f64,
        scalability: f64,
        risk: f64,
        timeline: f64,
    ) -> Self {
        Self {
            feasibility: clamp(feasibility, 0.0, 10.0),
            innovation: clamp(innovation, 0.0, 10.0),
            impact: clamp(impact, 0.0, 10.0),
            cost_effectiveness: clamp(cost_effectiveness, 0.0, 10.0),
            scalability: clamp(scalability, 0.0, 10.0),
            // Normalize the source's "risk" onto a higher-is-better scale.
            safety: clamp(10.0 - risk, 0.0, 10.0),
            timeline: clamp(timeline, 0.0, 10.0),
        }
    }

    /// Weighted mean across all seven dimensions.
    pub fn overall(&self, weights: &DimensionWeights) -> f64 {
        self.feasibility * weights.feasibility
            + self.innovation * weights.innovation
            + self.impact * weights.impact
            + self.cost_effectiveness * weights.cost_effectiveness
            + self.scalability * weights.scalability
            + self.safety * weights.safety
            + self.timeline * weights.timeline
    }
}

/// The kind of logical analysis performed on an idea.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InferenceKind {
    Full,
    Causal,
    Constraints,
    Contradiction,
    Implications,
}

impl Default for InferenceKind {
    fn default() -> Self {
        Self::Full
    }
}

/// Structured reasoning produced by the logical inference engine for one idea.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InferenceResult {
    pub idea_id: String,
    #[serde(default)]
    pub inference_chain: Vec<String>,
    pub conclusion: String,
    pub confidence: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(rename = "type")]
    pub kind: InferenceKind,
}

impl InferenceResult {
    pub fn new(
        idea_id: impl Into<String>,
        inference_chain: Vec<String>,
        conclusion: impl Into<String>,
        confidence: f64,
        suggestions: Vec<String>,
        kind: InferenceKind,
    ) -> Self {
        Self {
            idea_id: idea_id.into(),
            inference_chain,
            conclusion: conclusion.into(),
            confidence: clamp(confidence, 0.0, 1.0),
            suggestions,
            kind,
        }
    }

    pub fn low_confidence(&self, threshold: f64) -> bool {
        self.confidence < threshold
    }
}

/// One fully-assembled, ranked result. `idea_id` is the aggregate key that
/// every stage's output is joined on, never list position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub idea: Idea,
    pub evaluation: Evaluation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advocacy: Option<AdvocacyBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skepticism: Option<SkepticismBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_idea: Option<Improvement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_evaluation: Option<Evaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_scores: Option<DimensionScores>,
    /// Weighted mean of `dimension_scores` against the configured
    /// `DimensionWeights`; `None` whenever `dimension_scores` is `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_overall: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference: Option<InferenceResult>,
}

impl Candidate {
    /// Score used for ranking: prefers the re-evaluated improved score,
    /// falling back to the original evaluation when no improvement landed.
    pub fn ranking_score(&self) -> f64 {
        self.improved_evaluation
            .as_ref()
            .map_or(self.evaluation.score, |e| e.score)
    }
}

/// Optional context attachments; ingestion itself is a collaborator's job.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Attachments {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Per-agent temperature overrides.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TemperatureProfile {
    pub generator: f32,
    pub critic: f32,
    pub advocate: f32,
    pub skeptic: f32,
    pub improver: f32,
}

impl Default for TemperatureProfile {
    fn default() -> Self {
        Self {
            generator: 0.9,
            critic: 0.3,
            advocate: 0.5,
            skeptic: 0.5,
            improver: 0.9,
        }
    }
}

/// Optional pipeline stages a caller can enable.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct WorkflowFlags {
    #[serde(default)]
    pub enhanced_reasoning: bool,
    #[serde(default)]
    pub multi_dim: bool,
    #[serde(default)]
    pub logical: bool,
    #[serde(default)]
    pub novelty: bool,
}

/// The single inbound request shape for `run_workflow`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub topic: String,
    pub context: String,
    pub num_ideas: u32,
    pub num_top: u32,
    #[serde(default)]
    pub temperature_profile: Option<TemperatureProfile>,
    #[serde(default)]
    pub flags: WorkflowFlags,
    #[serde(default)]
    pub attachments: Option<Attachments>,
    pub deadline_seconds: u64,
    #[serde(default)]
    pub request_id: RequestId,
}

impl WorkflowRequest {
    pub fn new(topic: impl Into<String>, context: impl Into<String>, num_ideas: u32, num_top: u32) -> Self {
        Self {
            topic: topic.into(),
            context: context.into(),
            num_ideas,
            num_top,
            temperature_profile: None,
            flags: WorkflowFlags::default(),
            attachments: None,
            deadline_seconds: 600,
            request_id: RequestId::new(),
        }
    }

    /// Reject a malformed request before any provider call (§7): `num_ideas`
    /// must be at least 1, `num_top` must fall within `[1, num_ideas]`, and
    /// `deadline_seconds` must fall within `[60, 3600]`.
    pub fn validate(&self) -> Result<()> {
        if self.num_ideas < 1 {
            return Err(WorkflowError::Configuration(format!(
                "num_ideas must be at least 1, got {}",
                self.num_ideas
            )));
        }
        if self.num_top < 1 || self.num_top > self.num_ideas {
            return Err(WorkflowError::Configuration(format!(
                "num_top must be in [1, num_ideas] (num_ideas={}), got {}",
                self.num_ideas, self.num_top
            )));
        }
        if !(60..=3600).contains(&self.deadline_seconds) {
            return Err(WorkflowError::Configuration(format!(
                "deadline_seconds must be in [60, 3600], got {}",
                self.deadline_seconds
            )));
        }
        Ok(())
    }
}

/// Aggregate usage accounting, attached to every `WorkflowResult`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_calls: u64,
    pub total_tokens: u64,
    pub total_latency_ms: u64,
    pub estimated_cost: f64,
    pub per_agent: HashMap<String, u64>,
    pub cache_hits: u64,
    pub retries: u64,
    pub fallback_events: u64,
}

/// The single outbound result shape for `run_workflow`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub request_id: RequestId,
    pub candidates: Vec<Candidate>,
    pub usage: UsageSummary,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub partial: bool,
}

/// Either a (possibly partial) result, or an outright failure. Callers never
/// see a mix of the two (§7).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Completed(WorkflowResult),
    Failed {
        reason: String,
        warnings: Vec<String>,
    },
}
