//! Provider Port
//!
//! The single outbound abstraction over an LLM backend (Strategy pattern,
//! mirroring the provider trait this crate's concurrent ancestor used for
//! swapping Ollama/OpenAI/Anthropic backends). The orchestrator and agent
//! operations depend only on this trait; no raw provider call happens
//! anywhere else in the crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::model::Attachments;
use crate::schema::SchemaId;

/// Usage accounting for a single provider call.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Usage {
    pub tokens: u32,
    pub latency_ms: u64,
    pub cost: f64,
    pub cached: bool,
}

impl Usage {
    /// Usage synthesized for a cache hit: zero latency/cost, `cached=true`.
    pub fn cached() -> Self {
        Self {
            tokens: 0,
            latency_ms: 0,
            cost: 0.0,
            cached: true,
        }
    }
}

/// Everything a structured-output call needs beyond the schema contract
/// itself. Grouped into one struct so `ProviderPort::generate_structured`
/// doesn't grow an ever-longer positional parameter list.
#[derive(Clone, Debug)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub system_instruction: &'a str,
    pub temperature: f32,
    pub token_budget: u32,
    pub attachments: Option<&'a Attachments>,
}

/// Strategy trait for LLM providers.
///
/// Implement this to add support for a new backend. The orchestrator works
/// exclusively through this interface, the same separation the teacher's
/// `LlmProvider` trait draws between agent logic and provider SDKs.
#[async_trait]
pub trait ProviderPort: Send + Sync {
    /// Generate output constrained to `schema_id`'s JSON Schema, returning
    /// the raw validated JSON value plus usage. Callers deserialize the
    /// value into a concrete type via `SchemaRegistry::validate_typed`.
    async fn generate_structured(
        &self,
        request: GenerationRequest<'_>,
        schema_id: SchemaId,
    ) -> Result<(Value, Usage)>;

    /// Free-form text generation, used only by extraction paths (not the
    /// core ideation pipeline, which is entirely schema-constrained).
    async fn generate_text(&self, request: GenerationRequest<'_>) -> Result<(String, Usage)>;

    /// Liveness check; must never panic or block indefinitely.
    async fn health(&self) -> bool;

    /// Provider name (e.g. "mock", "http-json").
    fn name(&self) -> &str;

    /// Model identifier in use.
    fn model(&self) -> &str;

    /// Whether this provider accepts file/url attachments alongside a prompt.
    fn supports_attachments(&self) -> bool {
        false
    }

    /// Estimated cost per token, used to populate `UsageSummary.estimated_cost`.
    fn cost_per_token(&self) -> f64 {
        0.0
    }
}
