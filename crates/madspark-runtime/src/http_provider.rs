//! HTTP JSON Provider
//!
//! `ProviderPort` implementation over a generic JSON-schema-constrained
//! chat completion endpoint via `reqwest`. Any backend that accepts
//! `{model, system, prompt, temperature, max_tokens, response_schema}` and
//! replies with `{content, usage: {prompt_tokens, completion_tokens}}`
//! can sit behind this provider without a dedicated client crate.

use std::time::Duration;

use async_trait::async_trait;
use madspark_core::provider::{GenerationRequest, ProviderPort, Usage};
use madspark_core::schema::SchemaId;
use madspark_core::{Result, SchemaRegistry, WorkflowError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

/// HTTP JSON provider configuration.
#[derive(Clone, Debug)]
pub struct HttpProviderConfig {
    /// Base completion endpoint, e.g. `https://api.example.com/v1/complete`.
    pub endpoint: String,

    /// Bearer token sent as `Authorization: Bearer <token>`, if present.
    pub api_key: Option<String>,

    /// Model identifier sent with every request.
    pub model: String,

    /// Request timeout.
    pub timeout_secs: u64,

    /// Estimated cost per token, used to populate `Usage::cost`.
    pub cost_per_token: f64,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1/complete".into(),
            api_key: None,
            model: "default-model".into(),
            timeout_secs: 60,
            cost_per_token: 0.0,
        }
    }
}

impl HttpProviderConfig {
    /// Build configuration from environment variables, following the same
    /// `from_env` convention the teacher's Ollama config uses.
    pub fn from_env() -> Self {
        let endpoint = std::env::var("MADSPARK_HTTP_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:8080/v1/complete".into());
        let api_key = std::env::var("MADSPARK_HTTP_API_KEY").ok();
        let model = std::env::var("MADSPARK_HTTP_MODEL").unwrap_or_else(|_| "default-model".into());
        let timeout_secs = std::env::var("MADSPARK_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        let cost_per_token = std::env::var("MADSPARK_HTTP_COST_PER_TOKEN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);

        Self {
            endpoint,
            api_key,
            model,
            timeout_secs,
            cost_per_token,
        }
    }
}

#[derive(Serialize)]
struct CompletionRequestBody<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_schema: Value,
}

#[derive(Deserialize)]
struct CompletionResponseBody {
    content: String,
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

#[derive(Deserialize, Default)]
struct ResponseUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// `ProviderPort` implementation speaking a generic JSON completion
/// protocol over HTTP. One concrete backend to prove the trait boundary
/// works end to end; a caller wanting OpenAI, Anthropic, or a local
/// inference server wires its own client behind `ProviderPort` the same way.
pub struct HttpJsonProvider {
    client: Client,
    config: HttpProviderConfig,
    registry: SchemaRegistry,
}

impl HttpJsonProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WorkflowError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            registry: SchemaRegistry::new(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(HttpProviderConfig::from_env())
    }

    fn request_builder(&self, body: &CompletionRequestBody<'_>) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(&self.config.endpoint).json(body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    fn usage_from(&self, usage: Option<ResponseUsage>) -> Usage {
        let usage = usage.unwrap_or_default();
        let tokens = usage.prompt_tokens + usage.completion_tokens;
        Usage {
            tokens,
            latency_ms: 0,
            cost: f64::from(tokens) * self.config.cost_per_token,
            cached: false,
        }
    }
}

#[async_trait]
impl ProviderPort for HttpJsonProvider {
    async fn generate_structured(
        &self,
        request: GenerationRequest<'_>,
        schema_id: SchemaId,
    ) -> Result<(Value, Usage)> {
        let body = CompletionRequestBody {
            model: &self.config.model,
            system: request.system_instruction,
            prompt: request.prompt,
            temperature: request.temperature,
            max_tokens: request.token_budget,
            response_schema: schema_id.json_schema(),
        };

        let response = self
            .request_builder(&body)
            .send()
            .await
            .map_err(|e| WorkflowError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WorkflowError::ProviderUnavailable(format!(
                "HTTP {} from completion endpoint",
                response.status()
            )));
        }

        let parsed: CompletionResponseBody = response
            .json()
            .await
            .map_err(|e| WorkflowError::ProviderInvalid(format!("malformed response body: {e}")))?;

        let (items, warnings) = self.registry.validate_batch(&parsed.content, schema_id)?;
        for warning in &warnings {
            warn!(schema = schema_id.as_str(), "{warning}");
        }
        Ok((json!({ "items": items }), self.usage_from(parsed.usage)))
    }

    async fn generate_text(&self, request: GenerationRequest<'_>) -> Result<(String, Usage)> {
        let body = CompletionRequestBody {
            model: &self.config.model,
            system: request.system_instruction,
            prompt: request.prompt,
            temperature: request.temperature,
            max_tokens: request.token_budget,
            response_schema: Value::Null,
        };

        let response = self
            .request_builder(&body)
            .send()
            .await
            .map_err(|e| WorkflowError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WorkflowError::ProviderUnavailable(format!(
                "HTTP {} from completion endpoint",
                response.status()
            )));
        }

        let parsed: CompletionResponseBody = response
            .json()
            .await
            .map_err(|e| WorkflowError::ProviderInvalid(format!("malformed response body: {e}")))?;

        Ok((parsed.content, self.usage_from(parsed.usage)))
    }

    async fn health(&self) -> bool {
        self.client.get(&self.config.endpoint).send().await.is_ok()
    }

    fn name(&self) -> &str {
        "http-json"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn cost_per_token(&self) -> f64 {
        self.config.cost_per_token
    }
}
