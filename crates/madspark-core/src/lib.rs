//! # madspark-core
//!
//! A multi-stage LLM ideation workflow: generate, critique, advocate,
//! challenge, improve, and rank candidate ideas against a user-supplied
//! topic and context.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                      WorkflowOrchestrator                          │
//! │  ┌───────────────┐  ┌──────────────────┐  ┌──────────────────────┐ │
//! │  │ AgentOperations│──│ MultiDimEvaluator│  │  InferenceEngine     │ │
//! │  │ (generate/eval/│  │ (7 fixed dims)   │  │  (5 reasoning kinds) │ │
//! │  │  advocate/     │  └──────────────────┘  └──────────────────────┘ │
//! │  │  skeptic/      │                                                │
//! │  │  improve)      │──│  RetryPolicy  │──│   ProviderPort (Strategy) │
//! │  └───────────────┘  └───────────────┘  └──────────────────────────┘ │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ProviderPort` trait enables swapping between a mock, an HTTP JSON
//! backend (`madspark-runtime`), or any other backend without changing
//! orchestration logic. Every structured-output contract is validated
//! against the `SchemaRegistry` before it reaches a typed model.

pub mod agents;
pub mod cache;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod inference;
pub mod mock;
pub mod model;
pub mod monitor;
pub mod novelty;
pub mod orchestrator;
pub mod progress;
pub mod provider;
pub mod retry;
pub mod schema;

pub use config::{RetryOverride, WorkflowConfig, WorkflowConfigBuilder};
pub use error::{Result, WorkflowError};
pub use mock::MockProvider;
pub use model::{
    AdvocacyBlock, Attachments, Candidate, ConcernResponse, DimensionScores, DimensionWeights, Evaluation, Idea,
    InferenceKind, InferenceResult, Improvement, RequestId, SkepticismBlock, TemperatureProfile, TitledPoint,
    UsageSummary, WorkflowFlags, WorkflowOutcome, WorkflowRequest, WorkflowResult,
};
pub use orchestrator::WorkflowOrchestrator;
pub use progress::{ChannelProgressBus, NullProgressSink, ProgressEvent, ProgressSink, SharedProgressSink, Stage};
pub use provider::{GenerationRequest, ProviderPort, Usage};
pub use schema::{SchemaId, SchemaRegistry};
