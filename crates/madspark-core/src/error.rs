//! Error Types

use thiserror::Error;

/// Result type alias for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Workflow error types
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Invalid configuration supplied at construction time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider unreachable, timed out, or returned a transport-level failure
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider responded but the content is unusable (auth, malformed, refusal)
    #[error("Provider invalid response: {0}")]
    ProviderInvalid(String),

    /// Output failed schema validation after all retries
    #[error("Schema mismatch for {schema}: {reason}")]
    SchemaMismatch { schema: String, reason: String },

    /// A stage failed but the workflow can continue in a degraded state
    #[error("Stage degraded: {0}")]
    StageDegraded(String),

    /// A stage failed in a way the workflow cannot recover from
    #[error("Stage fatal: {0}")]
    StageFatal(String),

    /// The overall workflow deadline elapsed before completion
    #[error("Workflow deadline exceeded after {elapsed_ms}ms (budget: {budget_ms}ms)")]
    WorkflowDeadlineExceeded { elapsed_ms: u64, budget_ms: u64 },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl WorkflowError {
    /// Check if error is retryable by the retry supervisor
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::ProviderUnavailable(_) | WorkflowError::SchemaMismatch { .. }
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Configuration(msg) => format!("Invalid configuration: {msg}"),
            WorkflowError::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            WorkflowError::ProviderInvalid(_) => {
                "The AI service returned an unusable response.".into()
            }
            WorkflowError::SchemaMismatch { schema, .. } => {
                format!("The AI service's response did not match the expected {schema} shape.")
            }
            WorkflowError::StageDegraded(msg) => format!("A workflow stage degraded: {msg}"),
            WorkflowError::StageFatal(msg) => format!("The workflow could not complete: {msg}"),
            WorkflowError::WorkflowDeadlineExceeded { .. } => {
                "The workflow took too long and was stopped.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for WorkflowError {
    fn from(err: anyhow::Error) -> Self {
        WorkflowError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_unavailable_is_retryable() {
        let err = WorkflowError::ProviderUnavailable("timeout".into());
        assert!(err.is_retryable());
    }

    #[test]
    fn stage_fatal_is_not_retryable() {
        let err = WorkflowError::StageFatal("idea generation exhausted retries".into());
        assert!(!err.is_retryable());
    }
}
