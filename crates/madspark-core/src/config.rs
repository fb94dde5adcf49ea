//! Workflow Configuration
//!
//! An explicit, validated configuration type rather than an untyped bag
//! (§6). Loading configuration from a file or environment is a
//! collaborator's job; this crate only validates and applies it.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Result, WorkflowError};
use crate::model::{DimensionWeights, TemperatureProfile};
use crate::retry::{AgentKind, RetryPolicy};

/// Per-agent override of the default retry table's `max_retries`/
/// `initial_delay`/`backoff_factor`.
#[derive(Clone, Copy, Debug)]
pub struct RetryOverride {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

/// Validated workflow-wide configuration.
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub default_temperature_profile: TemperatureProfile,
    retry_overrides: HashMap<AgentKind, RetryOverride>,
    pub workflow_deadline_seconds: u64,
    pub max_workers: usize,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,
    pub novelty_threshold: f64,
    pub meaningful_similarity: f64,
    pub meaningful_score_delta: f64,
    pub dimension_weights: DimensionWeights,
    pub logical_confidence_threshold: f64,
    pub mock_mode: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_temperature_profile: TemperatureProfile::default(),
            retry_overrides: HashMap::new(),
            workflow_deadline_seconds: 600,
            max_workers: 4,
            cache_enabled: true,
            cache_ttl_seconds: 86_400,
            novelty_threshold: 0.85,
            meaningful_similarity: 0.9,
            meaningful_score_delta: 0.3,
            dimension_weights: DimensionWeights::default(),
            logical_confidence_threshold: 0.0,
            mock_mode: false,
        }
    }
}

impl WorkflowConfig {
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder::new()
    }

    /// Effective retry policy for `agent`: the §4.C default table, merged
    /// with any caller override.
    pub fn retry_policy(&self, agent: AgentKind) -> RetryPolicy {
        let mut policy = RetryPolicy::for_agent(agent);
        if let Some(over) = self.retry_overrides.get(&agent) {
            policy.max_retries = over.max_retries;
            policy.initial_delay = over.initial_delay;
            policy.backoff_factor = over.backoff_factor;
        }
        policy
    }

    pub fn workflow_deadline(&self) -> Duration {
        Duration::from_secs(self.workflow_deadline_seconds)
    }

    fn validate(&self) -> Result<()> {
        if !(60..=3600).contains(&self.workflow_deadline_seconds) {
            return Err(WorkflowError::Configuration(format!(
                "workflow_deadline_seconds must be in [60, 3600], got {}",
                self.workflow_deadline_seconds
            )));
        }
        if self.max_workers == 0 {
            return Err(WorkflowError::Configuration("max_workers must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.novelty_threshold) {
            return Err(WorkflowError::Configuration("novelty_threshold must be in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.meaningful_similarity) {
            return Err(WorkflowError::Configuration(
                "meaningful_similarity must be in [0, 1]".into(),
            ));
        }
        if self.meaningful_score_delta < 0.0 {
            return Err(WorkflowError::Configuration(
                "meaningful_score_delta must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.logical_confidence_threshold) {
            return Err(WorkflowError::Configuration(
                "logical_confidence_threshold must be in [0, 1]".into(),
            ));
        }
        let weight_sum = self.dimension_weights.sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(WorkflowError::Configuration(format!(
                "dimension_weights must sum to 1.0, got {weight_sum}"
            )));
        }
        Ok(())
    }
}

/// Builder for `WorkflowConfig`; validation happens once, at `build()`.
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl Default for WorkflowConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: WorkflowConfig::default(),
        }
    }

    pub fn temperature_profile(mut self, profile: TemperatureProfile) -> Self {
        self.config.default_temperature_profile = profile;
        self
    }

    pub fn retry_override(mut self, agent: AgentKind, over: RetryOverride) -> Self {
        self.config.retry_overrides.insert(agent, over);
        self
    }

    pub fn workflow_deadline_seconds(mut self, seconds: u64) -> Self {
        self.config.workflow_deadline_seconds = seconds;
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.max_workers = workers;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    pub fn cache_ttl_seconds(mut self, ttl: u64) -> Self {
        self.config.cache_ttl_seconds = ttl;
        self
    }

    pub fn novelty_threshold(mut self, threshold: f64) -> Self {
        self.config.novelty_threshold = threshold;
        self
    }

    pub fn meaningful_improvement(mut self, similarity: f64, score_delta: f64) -> Self {
        self.config.meaningful_similarity = similarity;
        self.config.meaningful_score_delta = score_delta;
        self
    }

    pub fn dimension_weights(mut self, weights: DimensionWeights) -> Self {
        self.config.dimension_weights = weights;
        self
    }

    pub fn logical_confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.logical_confidence_threshold = threshold;
        self
    }

    pub fn mock_mode(mut self, mock: bool) -> Self {
        self.config.mock_mode = mock;
        self
    }

    pub fn build(self) -> Result<WorkflowConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(WorkflowConfig::builder().build().is_ok());
    }

    #[test]
    fn rejects_deadline_out_of_range() {
        let err = WorkflowConfig::builder()
            .workflow_deadline_seconds(10)
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let weights = DimensionWeights {
            feasibility: 0.5,
            innovation: 0.5,
            impact: 0.5,
            cost_effectiveness: 0.0,
            scalability: 0.0,
            safety: 0.0,
            timeline: 0.0,
        };
        let err = WorkflowConfig::builder().dimension_weights(weights).build().unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));
    }

    #[test]
    fn retry_override_merges_with_default_table() {
        let config = WorkflowConfig::builder()
            .retry_override(
                AgentKind::Advocate,
                RetryOverride {
                    max_retries: 5,
                    initial_delay: Duration::from_millis(10),
                    backoff_factor: 1.5,
                },
            )
            .build()
            .unwrap();

        let policy = config.retry_policy(AgentKind::Advocate);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));

        let unmodified = config.retry_policy(AgentKind::Critic);
        assert_eq!(unmodified.max_retries, 3);
    }
}
