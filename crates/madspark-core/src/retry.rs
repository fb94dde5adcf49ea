//! Retry/Timeout Supervisor
//!
//! Wraps a provider call with per-agent retry policy, exponential backoff,
//! and deadline enforcement. Retries apply only to errors the provider
//! itself flags as retryable (`WorkflowError::is_retryable`); `SchemaMismatch`
//! is retried at most once per call regardless of the policy's retry budget,
//! since a provider that keeps failing schema validation is unlikely to
//! self-correct through repetition (§4.B/§4.C).

use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::error::{Result, WorkflowError};

/// The seven named agent roles the retry table and monitoring breakdown key on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Generator,
    Critic,
    Advocate,
    Skeptic,
    Improver,
    Inference,
    MultiDimEval,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Generator => "generator",
            AgentKind::Critic => "critic",
            AgentKind::Advocate => "advocate",
            AgentKind::Skeptic => "skeptic",
            AgentKind::Improver => "improver",
            AgentKind::Inference => "inference",
            AgentKind::MultiDimEval => "multi_dim_eval",
        }
    }
}

/// Retry/backoff/deadline policy for one agent role.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    /// Per-attempt deadline; the effective deadline used is
    /// `min(deadline, workflow_deadline - elapsed)`.
    pub deadline: Duration,
}

impl RetryPolicy {
    /// Default table from §4.C. `max_delay`/`deadline` are not pinned by the
    /// table; chosen generously so exponential backoff never dominates a
    /// typical 600s workflow deadline (see DESIGN.md).
    pub fn for_agent(agent: AgentKind) -> Self {
        let (max_retries, initial_delay) = match agent {
            AgentKind::Generator => (3, Duration::from_secs_f64(2.0)),
            AgentKind::Critic => (3, Duration::from_secs_f64(2.0)),
            AgentKind::Advocate => (2, Duration::from_secs_f64(1.0)),
            AgentKind::Skeptic => (2, Duration::from_secs_f64(1.0)),
            AgentKind::Improver => (3, Duration::from_secs_f64(2.0)),
            AgentKind::Inference => (2, Duration::from_secs_f64(1.0)),
            AgentKind::MultiDimEval => (2, Duration::from_secs_f64(1.0)),
        };

        Self {
            max_retries,
            initial_delay,
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
            deadline: Duration::from_secs(60),
        }
    }
}

/// Run `op` under `policy`, retrying retryable failures with exponential
/// backoff until either the policy's retry budget or `workflow_deadline` is
/// exhausted. `on_retry` is invoked once per retry attempt (monitoring hook).
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    workflow_deadline: Instant,
    mut on_retry: impl FnMut(),
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    let mut delay = policy.initial_delay;
    let mut schema_mismatch_retried = false;

    loop {
        let remaining = workflow_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(WorkflowError::WorkflowDeadlineExceeded {
                elapsed_ms: 0,
                budget_ms: 0,
            });
        }
        let effective_deadline = policy.deadline.min(remaining);

        let attempt_result = tokio::time::timeout(effective_deadline, op()).await;

        match attempt_result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                let is_schema_mismatch = matches!(err, WorkflowError::SchemaMismatch { .. });
                let can_retry = if is_schema_mismatch {
                    !schema_mismatch_retried
                } else {
                    err.is_retryable()
                };

                if can_retry && attempt < policy.max_retries {
                    if is_schema_mismatch {
                        schema_mismatch_retried = true;
                    }
                    attempt += 1;
                    on_retry();
                    sleep(delay).await;
                    delay = delay.mul_f64(policy.backoff_factor).min(policy.max_delay);
                    continue;
                }
                return Err(err);
            }
            Err(_elapsed) => {
                if attempt < policy.max_retries {
                    attempt += 1;
                    on_retry();
                    sleep(delay).await;
                    delay = delay.mul_f64(policy.backoff_factor).min(policy.max_delay);
                    continue;
                }
                return Err(WorkflowError::WorkflowDeadlineExceeded {
                    elapsed_ms: effective_deadline.as_millis() as u64,
                    budget_ms: policy.deadline.as_millis() as u64,
                });
            }
        }
    }
}
