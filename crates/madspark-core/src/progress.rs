//! Progress Bus
//!
//! An append-only, push-only stream of pipeline progress events. The
//! orchestrator is the sole writer per request; any number of readers may
//! subscribe. If nobody is listening, events are dropped silently — the
//! same semantics `tokio::sync::broadcast` already gives a zero-receiver
//! send.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Pipeline stage names, matching the external JSON shape (§6) exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generating,
    Evaluating,
    Advocating,
    Skeptical,
    Improving,
    Reevaluating,
    Scoring,
    Inferring,
    Done,
}

/// One progress update. `progress` is non-decreasing within a request and
/// reaches 100 exactly once, on success (§8 property 10).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProgressEvent {
    pub fn new(stage: Stage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Sink the orchestrator pushes progress events to. Collaborators adapt
/// this to their transport (WebSocket, CLI bar, log); the core depends
/// only on this contract.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// No-op sink for callers who don't want progress streaming (the default
/// for sync-mode runs that don't subscribe).
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Broadcast-backed progress bus. Cloning the sender is how subscribers are
/// created; sends with zero receivers succeed silently.
pub struct ChannelProgressBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ChannelProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressSink for ChannelProgressBus {
    fn emit(&self, event: ProgressEvent) {
        // `send` only errors when there are no receivers; that is a normal,
        // silent no-op per the push-only contract, not a failure.
        let _ = self.sender.send(event);
    }
}

/// Convenience alias for the trait-object form the orchestrator holds.
pub type SharedProgressSink = Arc<dyn ProgressSink>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_events_in_order() {
        let bus = ChannelProgressBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(ProgressEvent::new(Stage::Generating, 10, "starting"));
        bus.emit(ProgressEvent::new(Stage::Evaluating, 40, "scoring ideas"));
        bus.emit(ProgressEvent::new(Stage::Done, 100, "complete"));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();

        assert_eq!(first.stage, Stage::Generating);
        assert_eq!(second.stage, Stage::Evaluating);
        assert_eq!(third.progress, 100);
    }

    #[test]
    fn emitting_with_no_subscribers_does_not_panic() {
        let bus = ChannelProgressBus::new(16);
        bus.emit(ProgressEvent::new(Stage::Done, 100, "complete"));
    }

    #[test]
    fn null_sink_drops_everything() {
        let sink = NullProgressSink;
        sink.emit(ProgressEvent::new(Stage::Generating, 0, "noop"));
    }
}
