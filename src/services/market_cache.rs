//! Latest market and indicator values per symbol.
//!
//! Ingestion may come from a different task than the monitor, so every
//! accessor takes the lock for one key-level operation and hands back copies.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::models::{
    market::{normalize_indicator, IndicatorSnapshot, MarketSnapshot, SymbolView},
    alert::normalize_symbol,
};

#[derive(Default)]
pub struct MarketDataCache {
    quotes: RwLock<HashMap<String, MarketSnapshot>>,
    // symbol -> indicator name -> last two values
    indicators: RwLock<HashMap<String, HashMap<String, IndicatorSnapshot>>>,
}

impl MarketDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the symbol's snapshot. Returns false when the sample was dropped.
    pub fn ingest(&self, symbol: &str, price: f64, volume: f64, ts: i64) -> bool {
        if !price.is_finite() || !volume.is_finite() {
            return false;
        }

        let snapshot = MarketSnapshot {
            price,
            volume,
            observed_at: ts,
        };

        let mut quotes = self.quotes.write().unwrap_or_else(PoisonError::into_inner);
        quotes.insert(normalize_symbol(symbol), snapshot);
        true
    }

    /// Shifts current -> previous and stores the new value.
    pub fn ingest_indicator(&self, symbol: &str, name: &str, value: f64, ts: i64) -> bool {
        if !value.is_finite() {
            return false;
        }

        let mut indicators = self
            .indicators
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let series = indicators.entry(normalize_symbol(symbol)).or_default();
        let name = normalize_indicator(name);

        let previous = series.get(&name).map(|s| s.current);
        series.insert(
            name,
            IndicatorSnapshot {
                current: value,
                previous,
                updated_at: ts,
            },
        );
        true
    }

    pub fn snapshot(&self, symbol: &str) -> Option<MarketSnapshot> {
        let quotes = self.quotes.read().unwrap_or_else(PoisonError::into_inner);
        quotes.get(&normalize_symbol(symbol)).copied()
    }

    pub fn indicator(&self, symbol: &str, name: &str) -> Option<IndicatorSnapshot> {
        let indicators = self.indicators.read().unwrap_or_else(PoisonError::into_inner);
        indicators
            .get(&normalize_symbol(symbol))
            .and_then(|series| series.get(&normalize_indicator(name)))
            .copied()
    }

    /// Copies out everything known about `symbol`. The average volume is
    /// filled in by the caller, which owns the rolling window.
    pub fn symbol_view(&self, symbol: &str) -> SymbolView {
        let key = normalize_symbol(symbol);
        let market = self.snapshot(&key);

        let indicators = {
            let guard = self.indicators.read().unwrap_or_else(PoisonError::into_inner);
            guard.get(&key).cloned().unwrap_or_default()
        };

        SymbolView {
            market,
            indicators,
            avg_volume: None,
        }
    }
}
