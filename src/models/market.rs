use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub price: f64,
    pub volume: f64,
    pub observed_at: i64,
}

/// Last two values of one indicator series, enough for crossover checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub current: f64,
    pub previous: Option<f64>,
    pub updated_at: i64,
}

/// Everything the evaluator may look at for one symbol, copied out of the
/// cache in one go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolView {
    pub market: Option<MarketSnapshot>,
    pub indicators: HashMap<String, IndicatorSnapshot>,
    pub avg_volume: Option<f64>,
}

impl SymbolView {
    pub fn indicator(&self, name: &str) -> Option<&IndicatorSnapshot> {
        self.indicators.get(name)
    }
}

pub const RSI: &str = "rsi";
pub const MACD: &str = "macd";
pub const MACD_SIGNAL: &str = "macd_signal";
pub const BB_UPPER: &str = "bb_upper";
pub const BB_LOWER: &str = "bb_lower";

pub fn normalize_indicator(name: &str) -> String {
    name.trim().to_lowercase()
}
