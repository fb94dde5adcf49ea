//! Workflow Orchestrator
//!
//! Composes the Schema Registry, Provider Port, Retry Supervisor, Response
//! Cache, Novelty Filter, Agent Operations, Multi-Dimensional Evaluator,
//! and Logical Inference Engine into the end-to-end eight-step pipeline
//! (§4.I). One algorithm, two entry points differing only in scheduler
//! strategy: `run_sync` executes every step straight-line; `run_async`
//! fans step 7's independent calls out concurrently, bounded by a
//! semaphore, and streams progress over a fresh broadcast channel per call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::agents::AgentOperations;
use crate::cache::InMemoryResponseCache;
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::evaluator::MultiDimEvaluator;
use crate::inference::InferenceEngine;
use crate::model::{Candidate, Evaluation, Idea, InferenceKind, UsageSummary, WorkflowOutcome, WorkflowRequest, WorkflowResult};
use crate::monitor::Monitor;
use crate::novelty::{is_meaningful_improvement, NoveltyFilter};
use crate::progress::{ChannelProgressBus, NullProgressSink, ProgressEvent, ProgressSink, SharedProgressSink, Stage};
use crate::provider::ProviderPort;
use crate::retry::AgentKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Sync,
    Async,
}

fn is_deadline_exceeded(err: &WorkflowError) -> bool {
    matches!(err, WorkflowError::WorkflowDeadlineExceeded { .. })
}

/// Bundles every collaborator a workflow run touches. Cheap to clone (every
/// field is an `Arc`), which is how `run_async` hands an independent
/// progress sink to its spawned task without sharing the caller's.
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    agents: Arc<AgentOperations>,
    evaluator: Arc<MultiDimEvaluator>,
    inference: Arc<InferenceEngine>,
    config: Arc<WorkflowConfig>,
    monitor: Arc<Monitor>,
    progress: SharedProgressSink,
    semaphore: Arc<Semaphore>,
}

impl WorkflowOrchestrator {
    pub fn new(provider: Arc<dyn ProviderPort>, config: WorkflowConfig) -> Self {
        let config = Arc::new(config);
        let monitor = Arc::new(Monitor::new());
        let cache = if config.cache_enabled {
            Some(Arc::new(InMemoryResponseCache::new(
                Duration::from_secs(config.cache_ttl_seconds),
                10_000,
            )) as Arc<dyn crate::cache::ResponseCache>)
        } else {
            None
        };

        let agents = Arc::new(AgentOperations::new(provider, cache, monitor.clone(), config.clone()));
        let evaluator = Arc::new(MultiDimEvaluator::new(agents.clone(), config.clone()));
        let inference = Arc::new(InferenceEngine::new(agents.clone(), config.clone()));
        let max_workers = config.max_workers;

        Self {
            agents,
            evaluator,
            inference,
            config,
            monitor,
            progress: Arc::new(NullProgressSink),
            semaphore: Arc::new(Semaphore::new(max_workers)),
        }
    }

    /// Attach a progress sink used by `run_sync`. `run_async` always builds
    /// its own channel instead, so this is purely for sync-mode streaming.
    pub fn with_progress_sink(mut self, sink: SharedProgressSink) -> Self {
        self.progress = sink;
        self
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Run the pipeline straight-line, emitting progress through whatever
    /// sink was attached via `with_progress_sink` (a no-op by default).
    pub async fn run_sync(&self, request: WorkflowRequest) -> WorkflowOutcome {
        if let Err(err) = request.validate() {
            return Self::rejected(err);
        }
        self.execute(request, Mode::Sync, self.progress.clone()).await
    }

    /// Run the pipeline with step 7 fanned out concurrently, returning a
    /// handle to await the result plus a fresh receiver for this request's
    /// progress events.
    pub fn run_async(&self, request: WorkflowRequest) -> (JoinHandle<WorkflowOutcome>, broadcast::Receiver<ProgressEvent>) {
        let bus = ChannelProgressBus::new(128);
        let receiver = bus.subscribe();
        let sink: SharedProgressSink = Arc::new(bus);
        let orchestrator = self.clone();

        let handle = tokio::spawn(async move {
            if let Err(err) = request.validate() {
                return Self::rejected(err);
            }
            orchestrator.execute(request, Mode::Async, sink).await
        });
        (handle, receiver)
    }

    /// A malformed request never reaches a provider call (§7): surfaced as
    /// an outright failure, not a degraded/partial result.
    fn rejected(err: WorkflowError) -> WorkflowOutcome {
        WorkflowOutcome::Failed {
            reason: err.user_message(),
            warnings: vec![err.to_string()],
        }
    }

    async fn execute(&self, request: WorkflowRequest, mode: Mode, progress: SharedProgressSink) -> WorkflowOutcome {
        let deadline = Instant::now() + Duration::from_secs(request.deadline_seconds);
        let mut warnings = Vec::new();
        let mut partial = false;

        info!(request_id = %request.request_id, topic = %request.topic, "workflow started");

        // Step 1: generate_ideas
        progress.emit(ProgressEvent::new(Stage::Generating, 5, "generating ideas"));
        let temps = request.temperature_profile.unwrap_or(self.config.default_temperature_profile);
        let (mut ideas, gen_warnings) = match self
            .agents
            .generate_ideas(&request.topic, &request.context, request.num_ideas, temps.generator, deadline)
            .await
        {
            Ok(ok) => ok,
            Err(err) if is_deadline_exceeded(&err) => {
                warn!("idea generation hit the workflow deadline; returning an empty result");
                return WorkflowOutcome::Completed(WorkflowResult {
                    request_id: request.request_id,
                    candidates: Vec::new(),
                    usage: self.monitor.snapshot(),
                    warnings: vec![format!("idea generation did not complete in time: {err}")],
                    partial: true,
                });
            }
            Err(err) => {
                return WorkflowOutcome::Failed {
                    reason: format!("idea generation failed: {}", err.user_message()),
                    warnings: vec![err.to_string()],
                }
            }
        };
        warnings.extend(gen_warnings);
        if warnings.iter().any(|w| w.contains("requested ideas")) {
            partial = true;
        }

        // Step 2: novelty_filter (optional)
        if request.flags.novelty {
            progress.emit(ProgressEvent::new(Stage::Generating, 15, "filtering near-duplicate ideas"));
            let mut filter = NoveltyFilter::new(self.config.novelty_threshold);
            let (kept, dup_warnings) = filter.filter(ideas);
            ideas = kept;
            warnings.extend(dup_warnings);
        }

        // Step 3: evaluate_ideas (batch, initial)
        progress.emit(ProgressEvent::new(Stage::Evaluating, 30, "evaluating ideas"));
        let evaluations = match self
            .agents
            .evaluate_ideas(&ideas, &request.topic, &request.context, temps.critic, deadline)
            .await
        {
            Ok((evaluations, eval_warnings)) => {
                warnings.extend(eval_warnings);
                evaluations
            }
            Err(err) if is_deadline_exceeded(&err) => {
                warn!("evaluation hit the workflow deadline; returning placeholder scores");
                partial = true;
                self.monitor.record_fallback(AgentKind::Critic);
                warnings.push(format!("evaluation did not complete in time: {err}"));
                ideas.iter().map(|idea| Evaluation::placeholder(idea.id.clone())).collect()
            }
            Err(err) => {
                return WorkflowOutcome::Failed {
                    reason: format!("evaluation failed: {}", err.user_message()),
                    warnings: vec![err.to_string()],
                }
            }
        };

        // Step 4: select_top_N by score, ties by original order
        let num_top = request.num_top.min(ideas.len() as u32) as usize;
        let mut ranked: Vec<usize> = (0..ideas.len()).collect();
        ranked.sort_by(|&a, &b| {
            evaluations[b]
                .score
                .partial_cmp(&evaluations[a].score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ideas[a].order_index.cmp(&ideas[b].order_index))
        });
        ranked.truncate(num_top);

        let top_ideas: Vec<Idea> = ranked.iter().map(|&i| ideas[i].clone()).collect();
        let top_evaluations: Vec<Evaluation> = ranked.iter().map(|&i| evaluations[i].clone()).collect();

        // Step 5: advocate_ideas then skepticize_ideas (sequential; skeptic
        // consumes the advocacy output regardless of scheduler mode).
        progress.emit(ProgressEvent::new(Stage::Advocating, 45, "building the case for each finalist"));
        let advocacy = match self
            .agents
            .advocate_ideas(&top_ideas, &top_evaluations, &request.topic, &request.context, temps.advocate, deadline)
            .await
        {
            Ok((blocks, advocacy_warnings)) => {
                warnings.extend(advocacy_warnings);
                blocks
            }
            Err(err) => {
                partial = true;
                self.monitor.record_fallback(AgentKind::Advocate);
                warnings.push(format!("advocacy unavailable: {err}"));
                Vec::new()
            }
        };

        progress.emit(ProgressEvent::new(Stage::Skeptical, 55, "stress-testing each finalist"));
        let skepticism = match self
            .agents
            .skepticize_ideas(&top_ideas, &advocacy, &request.topic, &request.context, temps.skeptic, deadline)
            .await
        {
            Ok((blocks, skepticism_warnings)) => {
                warnings.extend(skepticism_warnings);
                blocks
            }
            Err(err) => {
                partial = true;
                self.monitor.record_fallback(AgentKind::Skeptic);
                warnings.push(format!("skepticism stage degraded: {err}"));
                Vec::new()
            }
        };

        // Step 6: improve_ideas(top, feedback)
        progress.emit(ProgressEvent::new(Stage::Improving, 65, "rewriting finalists in light of feedback"));
        let improvements = match self
            .agents
            .improve_ideas(
                &top_ideas,
                &top_evaluations,
                &advocacy,
                &skepticism,
                &request.topic,
                &request.context,
                temps.improver,
                deadline,
            )
            .await
        {
            Ok((improvements, improve_warnings)) => {
                if !improve_warnings.is_empty() {
                    partial = true;
                }
                warnings.extend(improve_warnings);
                improvements
            }
            Err(err) => {
                // §9 open question #2: fall back to the original idea, not
                // to an empty list, so re-evaluation still has text to score.
                partial = true;
                self.monitor.record_fallback(AgentKind::Improver);
                warnings.push(format!("improvement stage degraded, falling back to originals: {err}"));
                top_ideas
                    .iter()
                    .map(|idea| crate::model::Improvement {
                        idea_id: idea.id.clone(),
                        improved_text: idea.text.clone(),
                        rationale: "No improvement could be generated; original idea retained.".into(),
                    })
                    .collect()
            }
        };

        let improved_ideas: Vec<Idea> = top_ideas
            .iter()
            .zip(improvements.iter())
            .map(|(idea, improvement)| Idea::new(idea.id.clone(), improvement.improved_text.clone(), idea.order_index))
            .collect();

        // Step 7: evaluate_ideas(improved) x multi_dim_eval(improved) x
        // logical_inference(improved) — independent of each other, so async
        // mode runs all three concurrently under the worker semaphore.
        let (reevaluations, dimension_scores, inference_results) = match mode {
            Mode::Async => {
                self.run_step_seven_concurrently(&improved_ideas, &top_evaluations, &request, deadline, &mut warnings, &mut partial)
                    .await
            }
            Mode::Sync => {
                self.run_step_seven_sequentially(&improved_ideas, &top_evaluations, &request, deadline, &mut warnings, &mut partial)
                    .await
            }
        };

        // §4.E/§8 property 9: flag improvements that didn't meaningfully move
        // the idea, using the re-evaluated score against the original.
        for (i, idea) in top_ideas.iter().enumerate() {
            let Some(improvement) = improvements.get(i) else { continue };
            let Some(reevaluation) = reevaluations.get(i) else { continue };
            if !is_meaningful_improvement(
                &idea.text,
                &improvement.improved_text,
                top_evaluations[i].score,
                reevaluation.score,
                self.config.meaningful_similarity,
                self.config.meaningful_score_delta,
            ) {
                warnings.push(format!("improvement for idea {} was not a meaningful improvement", idea.id));
            }
        }

        // Step 8: assemble Candidates; sort; emit result
        progress.emit(ProgressEvent::new(Stage::Done, 100, "workflow complete"));

        let weights = self.evaluator.weights();
        let mut candidates: Vec<Candidate> = (0..top_ideas.len())
            .map(|i| {
                let dimension_scores = dimension_scores.as_ref().and_then(|scores| scores.get(i)).copied();
                Candidate {
                    idea: top_ideas[i].clone(),
                    evaluation: top_evaluations[i].clone(),
                    advocacy: advocacy.get(i).cloned(),
                    skepticism: skepticism.get(i).cloned(),
                    improved_idea: improvements.get(i).cloned(),
                    improved_evaluation: reevaluations.get(i).cloned(),
                    dimension_overall: dimension_scores.as_ref().map(|scores| scores.overall(&weights)),
                    dimension_scores,
                    inference: inference_results.as_ref().and_then(|results| results.get(i)).cloned(),
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.ranking_score()
                .partial_cmp(&a.ranking_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.evaluation.score.partial_cmp(&a.evaluation.score).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.idea.order_index.cmp(&b.idea.order_index))
        });

        if request.flags.multi_dim && dimension_scores.is_none() {
            partial = true;
        }

        WorkflowOutcome::Completed(WorkflowResult {
            request_id: request.request_id,
            candidates,
            usage: self.monitor.snapshot(),
            warnings,
            partial,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step_seven_sequentially(
        &self,
        improved_ideas: &[Idea],
        base_evaluations: &[Evaluation],
        request: &WorkflowRequest,
        deadline: Instant,
        warnings: &mut Vec<String>,
        partial: &mut bool,
    ) -> (Vec<Evaluation>, Option<Vec<crate::model::DimensionScores>>, Option<Vec<crate::model::InferenceResult>>) {
        let reevaluations = match self
            .agents
            .evaluate_ideas(
                improved_ideas,
                &request.topic,
                &request.context,
                self.config.default_temperature_profile.critic,
                deadline,
            )
            .await
        {
            Ok((evaluations, re_warnings)) => {
                warnings.extend(re_warnings);
                evaluations
            }
            Err(err) => {
                *partial = true;
                self.monitor.record_fallback(AgentKind::Critic);
                warnings.push(format!("re-evaluation stage degraded: {err}"));
                improved_ideas.iter().map(|idea| Evaluation::placeholder(idea.id.clone())).collect()
            }
        };

        let dimension_scores = if request.flags.multi_dim {
            match self
                .evaluator
                .score_ideas(improved_ideas, base_evaluations, &request.topic, &request.context, deadline)
                .await
            {
                Ok((scores, dim_warnings)) => {
                    warnings.extend(dim_warnings);
                    Some(scores)
                }
                Err(err) => {
                    *partial = true;
                    self.monitor.record_fallback(AgentKind::MultiDimEval);
                    warnings.push(format!("multi-dimensional scoring degraded: {err}"));
                    None
                }
            }
        } else {
            None
        };

        let inference_results = if request.flags.logical {
            match self
                .inference
                .infer(improved_ideas, InferenceKind::Full, &request.topic, &request.context, deadline)
                .await
            {
                Ok((results, inf_warnings)) => {
                    warnings.extend(inf_warnings);
                    Some(results)
                }
                Err(err) => {
                    *partial = true;
                    self.monitor.record_fallback(AgentKind::Inference);
                    warnings.push(format!("logical inference degraded: {err}"));
                    None
                }
            }
        } else {
            None
        };

        (reevaluations, dimension_scores, inference_results)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step_seven_concurrently(
        &self,
        improved_ideas: &[Idea],
        base_evaluations: &[Evaluation],
        request: &WorkflowRequest,
        deadline: Instant,
        warnings: &mut Vec<String>,
        partial: &mut bool,
    ) -> (Vec<Evaluation>, Option<Vec<crate::model::DimensionScores>>, Option<Vec<crate::model::InferenceResult>>) {
        let sem = self.semaphore.clone();
        let eval_fut = async {
            let _permit = sem.acquire().await.ok();
            self.agents
                .evaluate_ideas(
                    improved_ideas,
                    &request.topic,
                    &request.context,
                    self.config.default_temperature_profile.critic,
                    deadline,
                )
                .await
        };

        let sem = self.semaphore.clone();
        let dim_fut = async {
            if !request.flags.multi_dim {
                return None;
            }
            let _permit = sem.acquire().await.ok();
            Some(
                self.evaluator
                    .score_ideas(improved_ideas, base_evaluations, &request.topic, &request.context, deadline)
                    .await,
            )
        };

        let sem = self.semaphore.clone();
        let inf_fut = async {
            if !request.flags.logical {
                return None;
            }
            let _permit = sem.acquire().await.ok();
            Some(
                self.inference
                    .infer(improved_ideas, InferenceKind::Full, &request.topic, &request.context, deadline)
                    .await,
            )
        };

        let (eval_result, dim_result, inf_result) = tokio::join!(eval_fut, dim_fut, inf_fut);

        let reevaluations = match eval_result {
            Ok((evaluations, re_warnings)) => {
                warnings.extend(re_warnings);
                evaluations
            }
            Err(err) => {
                *partial = true;
                self.monitor.record_fallback(AgentKind::Critic);
                warnings.push(format!("re-evaluation stage degraded: {err}"));
                improved_ideas.iter().map(|idea| Evaluation::placeholder(idea.id.clone())).collect()
            }
        };

        let dimension_scores = match dim_result {
            Some(Ok((scores, dim_warnings))) => {
                warnings.extend(dim_warnings);
                Some(scores)
            }
            Some(Err(err)) => {
                *partial = true;
                self.monitor.record_fallback(AgentKind::MultiDimEval);
                warnings.push(format!("multi-dimensional scoring degraded: {err}"));
                None
            }
            None => None,
        };

        let inference_results = match inf_result {
            Some(Ok((results, inf_warnings))) => {
                warnings.extend(inf_warnings);
                Some(results)
            }
            Some(Err(err)) => {
                *partial = true;
                self.monitor.record_fallback(AgentKind::Inference);
                warnings.push(format!("logical inference degraded: {err}"));
                None
            }
            None => None,
        };

        (reevaluations, dimension_scores, inference_results)
    }

    pub fn usage_summary(&self) -> UsageSummary {
        self.monitor.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    fn orchestrator() -> WorkflowOrchestrator {
        WorkflowOrchestrator::new(Arc::new(MockProvider::new()), WorkflowConfig::default())
    }

    #[tokio::test]
    async fn run_sync_produces_ranked_candidates() {
        let orchestrator = orchestrator();
        let request = WorkflowRequest::new("urban farming", "limited budget", 5, 3);

        match orchestrator.run_sync(request).await {
            WorkflowOutcome::Completed(result) => {
                assert_eq!(result.candidates.len(), 3);
                assert!(!result.partial, "mock pipeline should complete cleanly: {:?}", result.warnings);
                for pair in result.candidates.windows(2) {
                    assert!(pair[0].ranking_score() >= pair[1].ranking_score());
                }
            }
            WorkflowOutcome::Failed { reason, .. } => panic!("expected success, got failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn run_async_streams_progress_and_completes() {
        let orchestrator = orchestrator();
        let request = WorkflowRequest::new("reef restoration", "coastal town", 4, 2);

        let (handle, mut rx) = orchestrator.run_async(request);

        let mut stages = Vec::new();
        while let Ok(event) = rx.recv().await {
            let done = event.stage == Stage::Done;
            stages.push(event.stage);
            if done {
                break;
            }
        }
        assert!(stages.contains(&Stage::Generating));
        assert!(stages.contains(&Stage::Done));

        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, WorkflowOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn advocate_unavailable_degrades_but_still_completes() {
        use crate::schema::SchemaId;
        let provider = Arc::new(MockProvider::new().fail_schema(SchemaId::Advocacy));
        let orchestrator = WorkflowOrchestrator::new(provider, WorkflowConfig::default());
        let request = WorkflowRequest::new("topic", "context", 3, 2);

        match orchestrator.run_sync(request).await {
            WorkflowOutcome::Completed(result) => {
                assert!(result.partial);
                assert!(result.warnings.iter().any(|w| w.contains("advocacy")));
                assert_eq!(result.usage.fallback_events, 1);
            }
            WorkflowOutcome::Failed { reason, .. } => panic!("advocacy failure should degrade, not fail: {reason}"),
        }
    }

    #[tokio::test]
    async fn idea_generation_unavailable_is_fatal() {
        use crate::schema::SchemaId;
        let provider = Arc::new(MockProvider::new().fail_schema(SchemaId::Idea));
        let orchestrator = WorkflowOrchestrator::new(provider, WorkflowConfig::default());
        let request = WorkflowRequest::new("topic", "context", 3, 2);

        match orchestrator.run_sync(request).await {
            WorkflowOutcome::Failed { .. } => {}
            WorkflowOutcome::Completed(_) => panic!("idea generation failure must be fatal"),
        }
    }

    #[tokio::test]
    async fn multi_dim_flag_populates_dimension_scores() {
        let orchestrator = orchestrator();
        let mut request = WorkflowRequest::new("topic", "context", 3, 2);
        request.flags.multi_dim = true;

        match orchestrator.run_sync(request).await {
            WorkflowOutcome::Completed(result) => {
                assert!(result.candidates.iter().all(|c| c.dimension_scores.is_some()));
                for candidate in &result.candidates {
                    let overall = candidate.dimension_overall.expect("overall computed alongside dimension_scores");
                    assert!((0.0..=10.0).contains(&overall));
                }
            }
            WorkflowOutcome::Failed { reason, .. } => panic!("unexpected failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_any_provider_call() {
        let orchestrator = orchestrator();
        let request = WorkflowRequest::new("topic", "context", 0, 0);

        match orchestrator.run_sync(request).await {
            WorkflowOutcome::Failed { reason, .. } => assert!(reason.to_lowercase().contains("configuration")),
            WorkflowOutcome::Completed(_) => panic!("num_ideas=0 must be rejected as a configuration error"),
        }
        assert_eq!(orchestrator.usage_summary().total_calls, 0, "no provider call should happen for an invalid request");
    }

    #[tokio::test]
    async fn num_top_above_num_ideas_is_rejected() {
        let orchestrator = orchestrator();
        let request = WorkflowRequest::new("topic", "context", 2, 5);

        match orchestrator.run_sync(request).await {
            WorkflowOutcome::Failed { .. } => {}
            WorkflowOutcome::Completed(_) => panic!("num_top > num_ideas must be rejected"),
        }
    }

    #[tokio::test]
    async fn run_async_also_rejects_invalid_request() {
        let orchestrator = orchestrator();
        let mut request = WorkflowRequest::new("topic", "context", 3, 2);
        request.deadline_seconds = 1;

        let (handle, _rx) = orchestrator.run_async(request);
        match handle.await.unwrap() {
            WorkflowOutcome::Failed { .. } => {}
            WorkflowOutcome::Completed(_) => panic!("out-of-range deadline must be rejected"),
        }
    }

    #[tokio::test]
    async fn non_meaningful_improvement_is_flagged() {
        // The mock critic always scores 6.0, so a re-evaluated improvement
        // never clears the default 0.3 score-delta threshold; every run
        // against the plain mock provider should surface the warning.
        let orchestrator = orchestrator();
        let request = WorkflowRequest::new("topic", "context", 2, 2);

        match orchestrator.run_sync(request).await {
            WorkflowOutcome::Completed(result) => {
                assert!(result.warnings.iter().any(|w| w.contains("not a meaningful improvement")));
            }
            WorkflowOutcome::Failed { reason, .. } => panic!("unexpected failure: {reason}"),
        }
    }
}
