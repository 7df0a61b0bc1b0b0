use tokio::sync::broadcast;

use crate::models::EngineEvent;

/// Receiver of engine events. Delivery to push/sound/desktop/email lives
/// behind this trait, outside the engine.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &EngineEvent);
}

/// Typed pub/sub over a tokio broadcast channel. Slow subscribers lag and
/// lose the oldest events; the engine never blocks on them.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl NotificationSink for EventBus {
    fn notify(&self, event: &EngineEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event.clone());
    }
}

/// Writes every event to the log. Handy when nothing else is listening.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: &EngineEvent) {
        match event {
            EngineEvent::Trigger(t) => {
                tracing::info!(alert_id = %t.alert_id, symbol = %t.symbol, "alert fired: {}", t.message)
            }
            EngineEvent::StateChanged(s) => {
                tracing::debug!(alert_id = %s.alert_id, "alert state {:?} -> {:?}", s.from, s.to)
            }
        }
    }
}

/// Sends each event to every inner sink in order.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<std::sync::Arc<dyn NotificationSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: std::sync::Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl NotificationSink for FanOut {
    fn notify(&self, event: &EngineEvent) {
        for sink in &self.sinks {
            sink.notify(event);
        }
    }
}
