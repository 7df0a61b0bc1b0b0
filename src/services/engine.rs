//! The alert engine: ingestion, management and the evaluation tick, wired to
//! injected storage, clock and notification sinks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use mongodb::bson::oid::ObjectId;
use tokio::sync::Mutex;

use crate::{
    error::{AlertError, PersistError},
    models::{
        alert::normalize_symbol, Alert, AlertConfig, AlertState, AlertStateChanged, AlertStats,
        EngineEvent, NotificationChannel, SymbolView, TriggerEvent,
    },
    services::{
        alert_sink::AlertSink,
        alert_store::AlertStore,
        clock::{Clock, SystemClock},
        evaluator::{self, Evaluation},
        market_cache::MarketDataCache,
        notifier::{LogSink, NotificationSink},
        scheduler::{self, Transition},
        volume_window::{AverageVolume, RollingVolume},
    },
};

const DEFAULT_COOLDOWN_MS: i64 = 300_000;
const DEFAULT_VOLUME_WINDOW: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Another tick was still running; nothing was done.
    pub skipped: bool,
    pub rearmed: usize,
    pub evaluated: usize,
    pub triggered: usize,
    pub persisted: bool,
    pub persist_failed: bool,
}

pub struct EngineBuilder {
    sink: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    volume: Arc<dyn AverageVolume>,
    default_cooldown_ms: i64,
}

impl EngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn volume(mut self, volume: Arc<dyn AverageVolume>) -> Self {
        self.volume = volume;
        self
    }

    pub fn default_cooldown_ms(mut self, ms: i64) -> Self {
        self.default_cooldown_ms = ms.max(0);
        self
    }

    /// Loads stored alerts from the sink and returns a ready engine.
    pub async fn build(self) -> Result<AlertEngine, PersistError> {
        let store = AlertStore::load(self.sink).await?;
        Ok(AlertEngine {
            store: Mutex::new(store),
            cache: MarketDataCache::new(),
            volume: self.volume,
            clock: self.clock,
            notifier: self.notifier,
            default_cooldown_ms: self.default_cooldown_ms,
            ticking: AtomicBool::new(false),
            ingest: std::sync::Mutex::new(()),
        })
    }
}

pub struct AlertEngine {
    // every alert mutation, including the whole tick, happens under this lock
    store: Mutex<AlertStore>,
    cache: MarketDataCache,
    volume: Arc<dyn AverageVolume>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    default_cooldown_ms: i64,
    ticking: AtomicBool,
    // keeps a tick's price and its volume sample visible together
    ingest: std::sync::Mutex<()>,
}

struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn state_event(alert: &Alert, (from, to): Transition, now: i64) -> EngineEvent {
    EngineEvent::StateChanged(AlertStateChanged {
        alert_id: alert.id.clone(),
        symbol: alert.symbol.clone(),
        from,
        to,
        timestamp: now,
    })
}

fn trigger_event(alert: &Alert, eval: &Evaluation, now: i64) -> EngineEvent {
    EngineEvent::Trigger(TriggerEvent {
        alert_id: alert.id.clone(),
        symbol: alert.symbol.clone(),
        alert_type: alert.alert_type,
        name: alert.name.clone(),
        message: evaluator::format_message(alert, &eval.payload),
        payload: eval.payload.clone(),
        timestamp: now,
        channels: alert.notification_channels.clone(),
        actions: alert.actions.clone(),
        trigger_count: alert.trigger_count,
    })
}

fn default_channels() -> BTreeSet<NotificationChannel> {
    BTreeSet::from([NotificationChannel::Push, NotificationChannel::Sound])
}

impl AlertEngine {
    pub fn builder(sink: Arc<dyn AlertSink>) -> EngineBuilder {
        EngineBuilder {
            sink,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogSink),
            volume: Arc::new(RollingVolume::new(DEFAULT_VOLUME_WINDOW)),
            default_cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn cache(&self) -> &MarketDataCache {
        &self.cache
    }

    fn emit(&self, events: Vec<EngineEvent>) {
        for event in &events {
            self.notifier.notify(event);
        }
    }

    // ---------------- Ingestion ----------------

    pub fn on_market_tick(&self, symbol: &str, price: f64, volume: f64, ts: i64) -> bool {
        let sym = normalize_symbol(symbol);
        if sym.is_empty() {
            tracing::debug!("dropped market tick for {:?}", symbol);
            return false;
        }

        let _ingest = self.ingest.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.cache.ingest(&sym, price, volume, ts) {
            tracing::debug!("dropped market tick for {:?}", symbol);
            return false;
        }
        self.volume.record(&sym, volume);
        true
    }

    pub fn on_indicator_update(&self, symbol: &str, name: &str, value: f64, ts: i64) -> bool {
        let sym = normalize_symbol(symbol);
        if sym.is_empty() || name.trim().is_empty() {
            return false;
        }
        self.cache.ingest_indicator(&sym, name, value, ts)
    }

    pub fn symbol_view(&self, symbol: &str) -> SymbolView {
        let sym = normalize_symbol(symbol);
        let _ingest = self.ingest.lock().unwrap_or_else(PoisonError::into_inner);
        let mut view = self.cache.symbol_view(&sym);
        view.avg_volume = self.volume.average(&sym);
        view
    }

    // ---------------- Management ----------------

    pub async fn create_alert(&self, config: AlertConfig) -> Result<Alert, AlertError> {
        let Some(alert_type) = config.alert_type else {
            return Err(AlertError::validation("alert type is required"));
        };

        let symbol = config.symbol.as_deref().map(normalize_symbol).unwrap_or_default();
        if symbol.is_empty() {
            return Err(AlertError::validation("symbol is required"));
        }

        if let Some(v) = config.value {
            if !v.is_finite() || v < 0.0 {
                return Err(AlertError::validation("value must be a finite, non-negative number"));
            }
        }
        if alert_type.requires_value() && !config.value.is_some_and(|v| v > 0.0) {
            return Err(AlertError::validation(format!(
                "{} alerts need a positive target value",
                alert_type.label()
            )));
        }

        let cooldown_ms = config.cooldown_ms.unwrap_or(self.default_cooldown_ms);
        if cooldown_ms < 0 {
            return Err(AlertError::validation("cooldownMs cannot be negative"));
        }
        if config.max_triggers == Some(0) {
            return Err(AlertError::validation("maxTriggers must be at least 1"));
        }

        let name = config
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{} {}", symbol, alert_type.label()));

        let alert = Alert {
            id: ObjectId::new().to_hex(),
            alert_type,
            symbol,
            name,
            value: config.value,
            enabled: true,
            triggered: false,
            trigger_count: 0,
            max_triggers: config.max_triggers,
            cooldown_ms,
            last_triggered_at: None,
            last_signal_at: None,
            created_at: self.now_ms(),
            notification_channels: config
                .notification_channels
                .unwrap_or_else(default_channels),
            actions: config.actions,
        };

        let mut store = self.store.lock().await;
        store.insert(alert.clone());
        tracing::info!(alert_id = %alert.id, "created {} alert on {}", alert.alert_type, alert.symbol);

        persisted(store.persist().await, &alert.id)?;
        Ok(alert)
    }

    async fn transition(
        &self,
        id: &str,
        f: impl FnOnce(&mut Alert) -> Result<Option<Transition>, AlertState>,
    ) -> Result<Alert, AlertError> {
        let now = self.now_ms();
        let mut store = self.store.lock().await;

        let outcome = store
            .modify(id, |a| f(a).map(|t| (a.clone(), t)))
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;

        let (alert, moved) = outcome.map_err(|from| AlertError::InvalidTransition {
            id: id.to_string(),
            from,
        })?;

        let written = store.persist().await;
        drop(store);

        if let Some(t) = moved {
            tracing::info!(alert_id = %id, "alert {:?} -> {:?}", t.0, t.1);
            self.emit(vec![state_event(&alert, t, now)]);
        }

        persisted(written, id)?;
        Ok(alert)
    }

    pub async fn enable_alert(&self, id: &str) -> Result<Alert, AlertError> {
        self.transition(id, scheduler::enable).await
    }

    pub async fn disable_alert(&self, id: &str) -> Result<Alert, AlertError> {
        self.transition(id, |a| Ok(scheduler::disable(a))).await
    }

    pub async fn reset_alert(&self, id: &str) -> Result<Alert, AlertError> {
        self.transition(id, |a| Ok(scheduler::reset(a))).await
    }

    pub async fn delete_alert(&self, id: &str) -> Result<Alert, AlertError> {
        let mut store = self.store.lock().await;
        let removed = store
            .remove(id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;

        if !store.is_watched(&removed.symbol) {
            tracing::info!("no alerts left on {}, symbol unwatched", removed.symbol);
        }

        persisted(store.persist().await, id)?;
        Ok(removed)
    }

    pub async fn get_alert(&self, id: &str) -> Result<Alert, AlertError> {
        self.store
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AlertError::NotFound(id.to_string()))
    }

    pub async fn get_alerts_by_symbol(&self, symbol: &str) -> Vec<Alert> {
        self.store.lock().await.by_symbol(&normalize_symbol(symbol))
    }

    pub async fn list_alerts(&self) -> Vec<Alert> {
        self.store.lock().await.all()
    }

    pub async fn get_alert_stats(&self) -> AlertStats {
        self.store.lock().await.stats()
    }

    pub async fn watched_symbols(&self) -> BTreeSet<String> {
        self.store.lock().await.watched_symbols()
    }

    pub async fn alert_state(&self, id: &str) -> Result<AlertState, AlertError> {
        self.get_alert(id).await.map(|a| scheduler::state_of(&a))
    }

    /// Writes any pending changes. Used on shutdown.
    pub async fn flush(&self) -> Result<bool, PersistError> {
        self.store.lock().await.persist().await
    }

    // ---------------- Evaluation ----------------

    /// One monitor pass: rearm cooled-down alerts, evaluate every Armed alert
    /// once, persist at most once, then publish events.
    pub async fn run_tick(&self) -> TickReport {
        if self
            .ticking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("tick still in flight, skipping");
            return TickReport {
                skipped: true,
                ..TickReport::default()
            };
        }
        let _guard = TickGuard(&self.ticking);

        let now = self.now_ms();
        let mut report = TickReport::default();
        let mut events: Vec<EngineEvent> = Vec::new();
        let mut store = self.store.lock().await;

        for id in store.ids() {
            let rearmed = store
                .modify(&id, |a| scheduler::rearm(a, now).map(|t| state_event(a, t, now)))
                .flatten();
            if let Some(ev) = rearmed {
                report.rearmed += 1;
                events.push(ev);
            }
        }

        // group by symbol => one cache read per symbol per tick
        let mut by_symbol: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for a in store.all() {
            if scheduler::state_of(&a) == AlertState::Armed {
                by_symbol.entry(a.symbol).or_default().push(a.id);
            }
        }

        for (sym, ids) in by_symbol {
            let view = self.symbol_view(&sym);

            for id in ids {
                let Some(alert) = store.get(&id) else {
                    continue;
                };
                let eval = evaluator::evaluate(alert, &view);
                report.evaluated += 1;

                if !eval.triggered {
                    continue;
                }

                let fired = store
                    .modify(&id, |a| {
                        let t = scheduler::apply_trigger(a, now)?;
                        a.last_signal_at = eval.sample_at.or(a.last_signal_at);
                        Some((trigger_event(a, &eval, now), state_event(a, t, now)))
                    })
                    .flatten();

                if let Some((trigger, changed)) = fired {
                    report.triggered += 1;
                    events.push(trigger);
                    events.push(changed);
                }
            }
        }

        match store.persist().await {
            Ok(written) => report.persisted = written,
            Err(e) => {
                report.persist_failed = true;
                tracing::warn!("alert persistence failed, will retry next tick: {}", e);
            }
        }
        drop(store);

        if report.triggered > 0 {
            tracing::info!("{} alert(s) triggered this tick", report.triggered);
        }
        self.emit(events);

        report
    }
}

fn persisted<T>(res: Result<T, PersistError>, id: &str) -> Result<(), AlertError> {
    res.map(|_| ()).map_err(|source| {
        tracing::warn!(alert_id = %id, "alert change kept in memory but not persisted: {}", source);
        AlertError::Persistence {
            alert_id: Some(id.to_string()),
            source,
        }
    })
}
