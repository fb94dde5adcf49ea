//! # madspark-runtime
//!
//! Runtime providers for `madspark-core`.
//!
//! ## Providers
//!
//! - **HTTP JSON** (default): a generic `reqwest`-backed `ProviderPort`
//!   speaking a JSON-schema-constrained chat completion protocol. Swap in
//!   any backend that accepts the same request/response shape.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use madspark_runtime::HttpJsonProvider;
//!
//! let provider = HttpJsonProvider::from_env()?;
//! let orchestrator = WorkflowOrchestrator::new(Arc::new(provider), WorkflowConfig::default());
//! ```

#[cfg(feature = "http")]
pub mod http_provider;

#[cfg(feature = "http")]
pub use http_provider::{HttpJsonProvider, HttpProviderConfig};

// Re-export core types for convenience
pub use madspark_core::{ProviderPort, Result, WorkflowError, WorkflowOrchestrator};
