use std::collections::BTreeSet;
use std::sync::Arc;

use alertwatch::{
    error::AlertError,
    models::{Alert, AlertConfig, AlertState, AlertType, EngineEvent},
    services::{
        alert_sink::MemorySink,
        clock::ManualClock,
        notifier::EventBus,
        volume_window::RollingVolume,
    },
    AlertEngine,
};
use tokio::sync::broadcast::Receiver;

struct Harness {
    engine: AlertEngine,
    clock: Arc<ManualClock>,
    sink: Arc<MemorySink>,
    rx: Receiver<EngineEvent>,
}

async fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(0));
    let sink = Arc::new(MemorySink::new());
    let bus = EventBus::new(64);
    let rx = bus.subscribe();

    let engine = AlertEngine::builder(sink.clone())
        .clock(clock.clone())
        .notifier(Arc::new(bus))
        .build()
        .await
        .expect("engine");

    Harness {
        engine,
        clock,
        sink,
        rx,
    }
}

fn drain(rx: &mut Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn triggers(events: &[EngineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Trigger(_)))
        .count()
}

fn config(t: AlertType, symbol: &str, value: Option<f64>) -> AlertConfig {
    AlertConfig {
        alert_type: Some(t),
        symbol: Some(symbol.to_string()),
        value,
        cooldown_ms: Some(0),
        ..AlertConfig::default()
    }
}

#[tokio::test]
async fn create_rejects_missing_type_or_symbol() {
    let h = harness().await;

    let no_type = AlertConfig {
        symbol: Some("AAPL".into()),
        value: Some(1.0),
        ..AlertConfig::default()
    };
    assert!(matches!(
        h.engine.create_alert(no_type).await,
        Err(AlertError::Validation(_))
    ));

    let blank_symbol = config(AlertType::PriceAbove, "   ", Some(1.0));
    assert!(matches!(
        h.engine.create_alert(blank_symbol).await,
        Err(AlertError::Validation(_))
    ));

    assert_eq!(h.engine.get_alert_stats().await.total, 0);
    assert!(h.sink.records().is_empty());
}

#[tokio::test]
async fn created_alert_is_armed_and_persisted() {
    let h = harness().await;

    let alert = h
        .engine
        .create_alert(config(AlertType::PriceAbove, "aapl", Some(100.0)))
        .await
        .unwrap();

    assert_eq!(alert.symbol, "AAPL");
    assert_eq!(alert.name, "AAPL price above");
    assert_eq!(h.engine.alert_state(&alert.id).await.unwrap(), AlertState::Armed);
    assert_eq!(h.sink.records(), vec![alert]);
}

#[tokio::test]
async fn price_above_triggers_on_inclusive_boundary() {
    let mut h = harness().await;
    let alert = h
        .engine
        .create_alert(config(AlertType::PriceAbove, "AAPL", Some(100.0)))
        .await
        .unwrap();

    h.engine.on_market_tick("AAPL", 99.99, 10.0, 0);
    let report = h.engine.run_tick().await;
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.triggered, 0);

    h.engine.on_market_tick("AAPL", 100.0, 10.0, 1);
    let report = h.engine.run_tick().await;
    assert_eq!(report.triggered, 1);

    let events = drain(&mut h.rx);
    let EngineEvent::Trigger(t) = &events[0] else {
        panic!("expected trigger first, got {:?}", events);
    };
    assert_eq!(t.alert_id, alert.id);
    assert_eq!(t.payload["price"], 100.0);
    assert!(t.message.contains("AAPL"));
    assert!(matches!(
        &events[1],
        EngineEvent::StateChanged(s) if s.from == AlertState::Armed && s.to == AlertState::Triggered
    ));
}

#[tokio::test]
async fn rsi_oversold_scenario() {
    let mut h = harness().await;
    h.engine
        .create_alert(config(AlertType::RsiOversold, "AAPL", Some(30.0)))
        .await
        .unwrap();

    h.engine.on_indicator_update("AAPL", "rsi", 32.0, 0);
    h.engine.run_tick().await;
    assert_eq!(triggers(&drain(&mut h.rx)), 0);

    h.engine.on_indicator_update("AAPL", "rsi", 28.0, 1);
    h.engine.run_tick().await;
    let events = drain(&mut h.rx);
    let Some(EngineEvent::Trigger(t)) = events.first() else {
        panic!("expected a trigger");
    };
    assert_eq!(t.payload["rsi"], 28.0);
}

#[tokio::test]
async fn macd_bullish_fires_on_cross_only() {
    let h = harness().await;
    let alert = h
        .engine
        .create_alert(config(AlertType::MacdBullish, "AAPL", None))
        .await
        .unwrap();

    // no cross: macd stays above signal
    for (macd, signal) in [(1.0, 0.0), (1.5, 0.5)] {
        h.engine.on_indicator_update("AAPL", "macd", macd, 0);
        h.engine.on_indicator_update("AAPL", "macd_signal", signal, 0);
    }
    assert_eq!(h.engine.run_tick().await.triggered, 0);

    // upward cross
    for (macd, signal) in [(-1.0, 0.0), (1.0, 0.5)] {
        h.engine.on_indicator_update("AAPL", "macd", macd, 1);
        h.engine.on_indicator_update("AAPL", "macd_signal", signal, 1);
    }
    assert_eq!(h.engine.run_tick().await.triggered, 1);
    assert_eq!(h.engine.get_alert(&alert.id).await.unwrap().trigger_count, 1);
}

#[tokio::test]
async fn macd_cross_fires_once_across_rearms() {
    let mut h = harness().await;
    let alert = h
        .engine
        .create_alert(config(AlertType::MacdBullish, "AAPL", None))
        .await
        .unwrap();

    for (macd, signal) in [(-1.0, 0.0), (1.0, 0.5)] {
        h.engine.on_indicator_update("AAPL", "macd", macd, 1);
        h.engine.on_indicator_update("AAPL", "macd_signal", signal, 1);
    }

    // cooldown is zero, so every tick rearms; the same cross must not fire again
    for step in 1..=5 {
        h.clock.set(step * 1_000);
        h.engine.run_tick().await;
    }
    assert_eq!(triggers(&drain(&mut h.rx)), 1);

    let stored = h.engine.get_alert(&alert.id).await.unwrap();
    assert_eq!(stored.trigger_count, 1);
    assert_eq!(stored.last_signal_at, Some(1));

    // a new cross on newer samples fires again
    for (macd, signal) in [(-1.0, 0.0), (1.0, 0.5)] {
        h.engine.on_indicator_update("AAPL", "macd", macd, 10);
        h.engine.on_indicator_update("AAPL", "macd_signal", signal, 10);
    }
    h.clock.set(10_000);
    assert_eq!(h.engine.run_tick().await.triggered, 1);
    assert_eq!(h.engine.get_alert(&alert.id).await.unwrap().trigger_count, 2);
}

#[tokio::test]
async fn cooldown_scenario() {
    let mut h = harness().await;
    let mut cfg = config(AlertType::PriceAbove, "AAPL", Some(100.0));
    cfg.cooldown_ms = Some(60_000);
    let alert = h.engine.create_alert(cfg).await.unwrap();

    h.engine.on_market_tick("AAPL", 105.0, 1.0, 0);

    h.clock.set(0);
    assert_eq!(h.engine.run_tick().await.triggered, 1);
    drain(&mut h.rx);

    h.clock.set(30_000);
    let report = h.engine.run_tick().await;
    assert_eq!(report.triggered, 0);
    assert_eq!(report.rearmed, 0);
    assert!(drain(&mut h.rx).is_empty());
    assert_eq!(h.engine.alert_state(&alert.id).await.unwrap(), AlertState::Triggered);

    h.clock.set(61_000);
    let report = h.engine.run_tick().await;
    assert_eq!(report.rearmed, 1);
    assert_eq!(report.triggered, 1);

    let stored = h.engine.get_alert(&alert.id).await.unwrap();
    assert_eq!(stored.trigger_count, 2);
    assert_eq!(stored.last_triggered_at, Some(61_000));
}

#[tokio::test]
async fn max_triggers_exhausts_the_alert() {
    let mut h = harness().await;
    let mut cfg = config(AlertType::PriceBelow, "MSFT", Some(400.0));
    cfg.max_triggers = Some(2);
    let alert = h.engine.create_alert(cfg).await.unwrap();

    h.engine.on_market_tick("MSFT", 390.0, 1.0, 0);
    for step in 1..=5 {
        h.clock.set(step * 1_000);
        h.engine.run_tick().await;
    }

    let stored = h.engine.get_alert(&alert.id).await.unwrap();
    assert_eq!(stored.trigger_count, 2);
    assert!(!stored.enabled);
    assert_eq!(h.engine.alert_state(&alert.id).await.unwrap(), AlertState::Exhausted);
    assert_eq!(triggers(&drain(&mut h.rx)), 2);

    // enable is refused, reset brings it back
    assert!(matches!(
        h.engine.enable_alert(&alert.id).await,
        Err(AlertError::InvalidTransition { from: AlertState::Exhausted, .. })
    ));
    let reset = h.engine.reset_alert(&alert.id).await.unwrap();
    assert_eq!(reset.trigger_count, 0);
    assert_eq!(reset.last_triggered_at, None);
    assert_eq!(h.engine.alert_state(&alert.id).await.unwrap(), AlertState::Armed);
}

#[tokio::test]
async fn reset_always_yields_fresh_armed_alert() {
    let h = harness().await;
    let alert = h
        .engine
        .create_alert(config(AlertType::PriceAbove, "AAPL", Some(1.0)))
        .await
        .unwrap();

    // from Armed
    let a = h.engine.reset_alert(&alert.id).await.unwrap();
    assert!(a.enabled && !a.triggered && a.trigger_count == 0);

    // from Triggered
    h.engine.on_market_tick("AAPL", 2.0, 1.0, 0);
    h.engine.run_tick().await;
    let a = h.engine.reset_alert(&alert.id).await.unwrap();
    assert_eq!((a.trigger_count, a.last_triggered_at), (0, None));

    // from Disabled
    h.engine.disable_alert(&alert.id).await.unwrap();
    h.engine.reset_alert(&alert.id).await.unwrap();
    assert_eq!(h.engine.alert_state(&alert.id).await.unwrap(), AlertState::Armed);
}

#[tokio::test]
async fn disabled_alerts_are_not_evaluated() {
    let h = harness().await;
    let alert = h
        .engine
        .create_alert(config(AlertType::PriceAbove, "AAPL", Some(1.0)))
        .await
        .unwrap();
    h.engine.on_market_tick("AAPL", 2.0, 1.0, 0);

    h.engine.disable_alert(&alert.id).await.unwrap();
    let report = h.engine.run_tick().await;
    assert_eq!(report.evaluated, 0);

    h.engine.enable_alert(&alert.id).await.unwrap();
    assert_eq!(h.engine.run_tick().await.triggered, 1);
}

#[tokio::test]
async fn deleting_last_alert_unwatches_symbol() {
    let h = harness().await;
    let a1 = h
        .engine
        .create_alert(config(AlertType::PriceAbove, "AAPL", Some(1.0)))
        .await
        .unwrap();
    let a2 = h
        .engine
        .create_alert(config(AlertType::RsiOverbought, "AAPL", None))
        .await
        .unwrap();
    h.engine
        .create_alert(config(AlertType::PriceBelow, "TSLA", Some(1.0)))
        .await
        .unwrap();

    h.engine.delete_alert(&a1.id).await.unwrap();
    assert!(h.engine.watched_symbols().await.contains("AAPL"));

    h.engine.delete_alert(&a2.id).await.unwrap();
    let watched = h.engine.watched_symbols().await;
    assert!(!watched.contains("AAPL"));
    assert!(watched.contains("TSLA"));

    assert!(matches!(
        h.engine.delete_alert(&a2.id).await,
        Err(AlertError::NotFound(_))
    ));
    assert_eq!(h.engine.get_alert_stats().await.watched_symbols, 1);
}

#[tokio::test]
async fn stats_and_symbol_listing() {
    let h = harness().await;
    let a = h
        .engine
        .create_alert(config(AlertType::PriceAbove, "AAPL", Some(1.0)))
        .await
        .unwrap();
    h.clock.set(10);
    let b = h
        .engine
        .create_alert(config(AlertType::PriceBelow, "AAPL", Some(1.0)))
        .await
        .unwrap();
    let c = h
        .engine
        .create_alert(config(AlertType::VolumeSpike, "TSLA", None))
        .await
        .unwrap();

    h.engine.on_market_tick("AAPL", 5.0, 1.0, 0);
    h.engine.run_tick().await;
    h.engine.disable_alert(&c.id).await.unwrap();

    let stats = h.engine.get_alert_stats().await;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 2);
    assert_eq!(stats.triggered, 1);
    assert_eq!(stats.disabled, 1);
    assert_eq!(stats.watched_symbols, 2);

    let aapl: Vec<String> = h
        .engine
        .get_alerts_by_symbol("aapl")
        .await
        .into_iter()
        .map(|x| x.id)
        .collect();
    assert_eq!(aapl, vec![b.id, a.id]);
}

#[tokio::test]
async fn tick_writes_once_and_only_when_dirty() {
    let h = harness().await;
    for sym in ["AAPL", "MSFT", "TSLA"] {
        let mut cfg = config(AlertType::PriceAbove, sym, Some(1.0));
        cfg.cooldown_ms = Some(60_000);
        h.engine.create_alert(cfg).await.unwrap();
        h.engine.on_market_tick(sym, 2.0, 1.0, 0);
    }
    let before = h.sink.write_count();

    let report = h.engine.run_tick().await;
    assert_eq!(report.triggered, 3);
    assert!(report.persisted);
    assert_eq!(h.sink.write_count(), before + 1);

    // nothing changed -> no write
    h.clock.set(1);
    let idle = h.engine.run_tick().await;
    assert!(!idle.persisted);
    assert_eq!(h.sink.write_count(), before + 1);
}

#[tokio::test]
async fn persistence_failure_keeps_memory_state() {
    let h = harness().await;
    h.sink.set_failing(true);

    let mut cfg = config(AlertType::PriceAbove, "AAPL", Some(1.0));
    cfg.cooldown_ms = Some(60_000);
    let err = h.engine.create_alert(cfg).await.unwrap_err();
    let AlertError::Persistence { alert_id: Some(id), .. } = err else {
        panic!("expected persistence error, got {:?}", err);
    };

    // alert still lives and keeps working
    assert!(h.engine.get_alert(&id).await.is_ok());
    h.engine.on_market_tick("AAPL", 2.0, 1.0, 0);
    let report = h.engine.run_tick().await;
    assert_eq!(report.triggered, 1);
    assert!(report.persist_failed);
    assert!(h.sink.records().is_empty());

    // next successful write restores durability
    h.sink.set_failing(false);
    h.clock.set(1);
    let report = h.engine.run_tick().await;
    assert!(report.persisted);
    assert_eq!(h.sink.records().len(), 1);
    assert_eq!(h.sink.records()[0].trigger_count, 1);
}

#[tokio::test]
async fn volume_spike_uses_rolling_average() {
    let h = harness().await;
    h.engine
        .create_alert(config(AlertType::VolumeSpike, "AAPL", Some(2.0)))
        .await
        .unwrap();

    for _ in 0..4 {
        h.engine.on_market_tick("AAPL", 10.0, 100.0, 0);
    }
    assert_eq!(h.engine.run_tick().await.triggered, 0);

    // average becomes (4 * 100 + 500) / 5 = 180, and 500 >= 360
    h.engine.on_market_tick("AAPL", 10.0, 500.0, 1);
    assert_eq!(h.engine.run_tick().await.triggered, 1);
}

#[tokio::test]
async fn alerts_reload_from_sink() {
    let sink = Arc::new(MemorySink::new());
    let first = AlertEngine::builder(sink.clone()).build().await.unwrap();
    let alert = first
        .create_alert(config(AlertType::PriceAbove, "AAPL", Some(10.0)))
        .await
        .unwrap();

    let second = AlertEngine::builder(sink.clone()).build().await.unwrap();
    assert_eq!(second.get_alert(&alert.id).await.unwrap(), alert);
    assert!(second.watched_symbols().await.contains("AAPL"));
}

#[tokio::test]
async fn loaded_alert_at_its_cap_is_exhausted_and_never_fires() {
    let stored = Alert {
        id: "capped".into(),
        alert_type: AlertType::PriceAbove,
        symbol: "AAPL".into(),
        name: "AAPL price above".into(),
        value: Some(100.0),
        enabled: true,
        triggered: false,
        trigger_count: 2,
        max_triggers: Some(2),
        cooldown_ms: 0,
        last_triggered_at: Some(0),
        last_signal_at: None,
        created_at: 0,
        notification_channels: BTreeSet::new(),
        actions: vec![],
    };
    let sink = Arc::new(MemorySink::with_records(vec![stored]));
    let engine = AlertEngine::builder(sink.clone())
        .clock(Arc::new(ManualClock::new(5_000)))
        .build()
        .await
        .unwrap();

    assert_eq!(engine.alert_state("capped").await.unwrap(), AlertState::Exhausted);

    engine.on_market_tick("AAPL", 150.0, 1.0, 1);
    let report = engine.run_tick().await;
    assert_eq!(report.triggered, 0);
    assert_eq!(engine.get_alert("capped").await.unwrap().trigger_count, 2);

    // the repaired record was written back
    assert!(report.persisted);
    assert!(!sink.records()[0].enabled);
}

#[test]
fn symbol_view_sees_price_and_volume_together() {
    let engine = Arc::new(
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(
                AlertEngine::builder(Arc::new(MemorySink::new()))
                    .volume(Arc::new(RollingVolume::new(1)))
                    .build(),
            )
            .unwrap(),
    );

    let writer = {
        let engine = engine.clone();
        std::thread::spawn(move || {
            for i in 1..=20_000 {
                engine.on_market_tick("AAPL", i as f64, i as f64, i);
            }
        })
    };

    // a window of one means the average must always equal the visible volume
    while !writer.is_finished() {
        let view = engine.symbol_view("AAPL");
        if let Some(market) = view.market {
            assert_eq!(view.avg_volume, Some(market.volume));
        }
    }
    writer.join().unwrap();

    let view = engine.symbol_view("AAPL");
    assert_eq!(view.market.map(|m| m.price), Some(20_000.0));
    assert_eq!(view.avg_volume, Some(20_000.0));
}
