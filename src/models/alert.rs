use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    PriceAbove,
    PriceBelow,
    VolumeSpike,
    RsiOversold,
    RsiOverbought,
    MacdBullish,
    MacdBearish,
    BollingerBreakout,
}

impl AlertType {
    pub fn label(self) -> &'static str {
        match self {
            AlertType::PriceAbove => "price above",
            AlertType::PriceBelow => "price below",
            AlertType::VolumeSpike => "volume spike",
            AlertType::RsiOversold => "RSI oversold",
            AlertType::RsiOverbought => "RSI overbought",
            AlertType::MacdBullish => "MACD bullish cross",
            AlertType::MacdBearish => "MACD bearish cross",
            AlertType::BollingerBreakout => "Bollinger breakout",
        }
    }

    /// Threshold used when an alert is stored without a value.
    /// Price alerts have no sensible default.
    pub fn default_value(self) -> Option<f64> {
        match self {
            AlertType::RsiOversold => Some(30.0),
            AlertType::RsiOverbought => Some(70.0),
            AlertType::VolumeSpike => Some(2.0),
            _ => None,
        }
    }

    pub fn requires_value(self) -> bool {
        matches!(self, AlertType::PriceAbove | AlertType::PriceBelow)
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Push,
    Sound,
    Desktop,
    Email,
}

/// Callback descriptor run by the notification collaborator when an alert fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAction {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Lifecycle state, derived from the stored fields rather than stored itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertState {
    Disabled,
    Armed,
    Triggered,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,

    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub symbol: String,
    pub name: String,

    // threshold or multiplier depending on type; null for signal-only alerts
    pub value: Option<f64>,

    pub enabled: bool,
    pub triggered: bool,
    pub trigger_count: u32,
    pub max_triggers: Option<u32>,
    pub cooldown_ms: i64,
    pub last_triggered_at: Option<i64>,
    // sample time of the crossover that last fired; a cross is consumed once
    #[serde(default)]
    pub last_signal_at: Option<i64>,
    pub created_at: i64,

    #[serde(default)]
    pub notification_channels: BTreeSet<NotificationChannel>,
    #[serde(default)]
    pub actions: Vec<AlertAction>,
}

impl Alert {
    pub fn threshold(&self) -> Option<f64> {
        self.value.or_else(|| self.alert_type.default_value())
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_triggers
            .is_some_and(|max| self.trigger_count >= max)
    }
}

/// Management-side request to create an alert. Everything but `type` and
/// `symbol` is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertConfig {
    #[serde(rename = "type")]
    pub alert_type: Option<AlertType>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub value: Option<f64>,
    pub max_triggers: Option<u32>,
    pub cooldown_ms: Option<i64>,
    pub notification_channels: Option<BTreeSet<NotificationChannel>>,
    #[serde(default)]
    pub actions: Vec<AlertAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    pub total: usize,
    pub active: usize,
    pub triggered: usize,
    pub disabled: usize,
    pub exhausted: usize,
    pub watched_symbols: usize,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
