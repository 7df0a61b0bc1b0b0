use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::{
    error::PersistError,
    models::{Alert, AlertState, AlertStats},
    services::{alert_sink::AlertSink, scheduler},
};

/// In-memory alert collection plus the symbol watch list. This copy is
/// authoritative; the sink only mirrors it.
pub struct AlertStore {
    alerts: HashMap<String, Alert>,
    // symbol -> number of alerts referencing it
    watched: HashMap<String, usize>,
    sink: Arc<dyn AlertSink>,
    dirty: bool,
}

impl AlertStore {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self {
            alerts: HashMap::new(),
            watched: HashMap::new(),
            sink,
            dirty: false,
        }
    }

    /// Builds a store from whatever the sink holds.
    pub async fn load(sink: Arc<dyn AlertSink>) -> Result<Self, PersistError> {
        let records = sink.load().await?;
        let mut store = Self::new(sink);
        let mut repaired = 0;
        for mut alert in records {
            // a record at its trigger cap can only be Exhausted
            if alert.enabled && alert.is_exhausted() {
                alert.enabled = false;
                repaired += 1;
            }
            store.insert(alert);
        }
        store.dirty = repaired > 0;
        if repaired > 0 {
            tracing::warn!(
                "{} stored alert(s) were enabled past their trigger cap, marked exhausted",
                repaired
            );
        }

        tracing::info!(
            "loaded {} alert(s) from {} sink",
            store.alerts.len(),
            store.sink.name()
        );
        Ok(store)
    }

    pub fn insert(&mut self, alert: Alert) {
        if let Some(old) = self.alerts.insert(alert.id.clone(), alert.clone()) {
            self.unwatch(&old.symbol);
        }
        *self.watched.entry(alert.symbol).or_insert(0) += 1;
        self.dirty = true;
    }

    pub fn remove(&mut self, id: &str) -> Option<Alert> {
        let alert = self.alerts.remove(id)?;
        self.unwatch(&alert.symbol);
        self.dirty = true;
        Some(alert)
    }

    fn unwatch(&mut self, symbol: &str) {
        if let Some(n) = self.watched.get_mut(symbol) {
            *n -= 1;
            if *n == 0 {
                self.watched.remove(symbol);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.get(id)
    }

    /// Runs `f` on the alert and marks the store dirty if the record changed.
    pub fn modify<R>(&mut self, id: &str, f: impl FnOnce(&mut Alert) -> R) -> Option<R> {
        let alert = self.alerts.get_mut(id)?;
        let before = alert.clone();
        let out = f(alert);
        if *alert != before {
            self.dirty = true;
        }
        Some(out)
    }

    /// All alerts, oldest first.
    pub fn all(&self) -> Vec<Alert> {
        let mut items: Vec<Alert> = self.alerts.values().cloned().collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    pub fn ids(&self) -> Vec<String> {
        self.all().into_iter().map(|a| a.id).collect()
    }

    /// Alerts for one symbol, newest first.
    pub fn by_symbol(&self, symbol: &str) -> Vec<Alert> {
        let mut items: Vec<Alert> = self
            .alerts
            .values()
            .filter(|a| a.symbol == symbol)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    pub fn watched_symbols(&self) -> BTreeSet<String> {
        self.watched.keys().cloned().collect()
    }

    pub fn is_watched(&self, symbol: &str) -> bool {
        self.watched.contains_key(symbol)
    }

    pub fn stats(&self) -> AlertStats {
        let mut stats = AlertStats {
            total: self.alerts.len(),
            watched_symbols: self.watched.len(),
            ..AlertStats::default()
        };

        for a in self.alerts.values() {
            match scheduler::state_of(a) {
                AlertState::Armed | AlertState::Triggered => stats.active += 1,
                AlertState::Disabled => stats.disabled += 1,
                AlertState::Exhausted => stats.exhausted += 1,
            }
            if a.triggered {
                stats.triggered += 1;
            }
        }

        stats
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the collection if anything changed since the last good write.
    /// On failure the store stays dirty so the next call retries.
    pub async fn persist(&mut self) -> Result<bool, PersistError> {
        if !self.dirty {
            return Ok(false);
        }

        let records = self.all();
        self.sink.save_all(&records).await?;
        self.dirty = false;

        tracing::debug!("persisted {} alert(s) to {}", records.len(), self.sink.name());
        Ok(true)
    }
}
