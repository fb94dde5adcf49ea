//! Monitoring
//!
//! Counts calls, tokens, latency, retries, cache hits, and fallback events
//! around every provider call, broken down per agent. Counters are atomic;
//! the per-agent map and cost accumulator share a small mutex since they
//! aren't hot enough to need lock-free structures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::model::UsageSummary;
use crate::provider::Usage;
use crate::retry::AgentKind;

#[derive(Default)]
struct Accumulator {
    per_agent: HashMap<String, u64>,
    estimated_cost: f64,
}

/// Read-only snapshot taken around a running workflow's provider calls.
pub struct Monitor {
    calls_total: AtomicU64,
    tokens_total: AtomicU64,
    latency_ms_total: AtomicU64,
    retries_total: AtomicU64,
    cache_hits_total: AtomicU64,
    fallback_total: AtomicU64,
    accum: Mutex<Accumulator>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            calls_total: AtomicU64::new(0),
            tokens_total: AtomicU64::new(0),
            latency_ms_total: AtomicU64::new(0),
            retries_total: AtomicU64::new(0),
            cache_hits_total: AtomicU64::new(0),
            fallback_total: AtomicU64::new(0),
            accum: Mutex::new(Accumulator::default()),
        }
    }

    /// Record the outcome of one completed provider call. Cache hits count
    /// toward `cache_hits_total` only, never `calls_total`/`tokens_total`
    /// (§8 property 6: cache coherence).
    pub fn record_call(&self, agent: AgentKind, usage: &Usage) {
        if usage.cached {
            self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.calls_total.fetch_add(1, Ordering::Relaxed);
        self.tokens_total.fetch_add(u64::from(usage.tokens), Ordering::Relaxed);
        self.latency_ms_total.fetch_add(usage.latency_ms, Ordering::Relaxed);

        let mut accum = self.accum.lock().unwrap_or_else(|e| e.into_inner());
        *accum.per_agent.entry(agent.as_str().to_string()).or_insert(0) += 1;
        accum.estimated_cost += usage.cost;
    }

    pub fn record_retry(&self, _agent: AgentKind) {
        self.retries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self, _agent: AgentKind) {
        self.fallback_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSummary {
        let accum = self.accum.lock().unwrap_or_else(|e| e.into_inner());
        UsageSummary {
            total_calls: self.calls_total.load(Ordering::Relaxed),
            total_tokens: self.tokens_total.load(Ordering::Relaxed),
            total_latency_ms: self.latency_ms_total.load(Ordering::Relaxed),
            estimated_cost: accum.estimated_cost,
            per_agent: accum.per_agent.clone(),
            cache_hits: self.cache_hits_total.load(Ordering::Relaxed),
            retries: self.retries_total.load(Ordering::Relaxed),
            fallback_events: self.fallback_total.load(Ordering::Relaxed),
        }
    }
}
