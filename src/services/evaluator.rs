//! Pure condition checks: alert + symbol view -> decision + the numbers used.
//!
//! Missing inputs never error; the alert just stays quiet until the data shows up.

use std::collections::BTreeMap;

use crate::models::{
    market::{BB_LOWER, BB_UPPER, MACD, MACD_SIGNAL, RSI},
    Alert, AlertType, SymbolView,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub triggered: bool,
    pub payload: BTreeMap<String, f64>,
    // newest indicator sample behind a crossover decision
    pub sample_at: Option<i64>,
}

impl Evaluation {
    fn quiet() -> Self {
        Self::default()
    }

    fn decide(triggered: bool, inputs: &[(&str, f64)]) -> Self {
        let payload = inputs
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        Self {
            triggered,
            payload,
            sample_at: None,
        }
    }

    fn at_sample(mut self, sample_at: i64) -> Self {
        self.sample_at = Some(sample_at);
        self
    }
}

pub fn evaluate(alert: &Alert, view: &SymbolView) -> Evaluation {
    let price = view.market.map(|m| m.price);

    match alert.alert_type {
        AlertType::PriceAbove => {
            let (Some(price), Some(threshold)) = (price, alert.threshold()) else {
                return Evaluation::quiet();
            };
            Evaluation::decide(
                price >= threshold,
                &[("price", price), ("threshold", threshold)],
            )
        }

        AlertType::PriceBelow => {
            let (Some(price), Some(threshold)) = (price, alert.threshold()) else {
                return Evaluation::quiet();
            };
            Evaluation::decide(
                price <= threshold,
                &[("price", price), ("threshold", threshold)],
            )
        }

        AlertType::VolumeSpike => {
            let (Some(market), Some(avg), Some(multiplier)) =
                (view.market, view.avg_volume, alert.threshold())
            else {
                return Evaluation::quiet();
            };
            Evaluation::decide(
                market.volume >= avg * multiplier,
                &[
                    ("volume", market.volume),
                    ("avgVolume", avg),
                    ("multiplier", multiplier),
                ],
            )
        }

        AlertType::RsiOversold | AlertType::RsiOverbought => {
            let (Some(rsi), Some(threshold)) = (view.indicator(RSI), alert.threshold()) else {
                return Evaluation::quiet();
            };
            let rsi = rsi.current;
            let hit = if alert.alert_type == AlertType::RsiOversold {
                rsi <= threshold
            } else {
                rsi >= threshold
            };
            Evaluation::decide(hit, &[("rsi", rsi), ("threshold", threshold)])
        }

        AlertType::MacdBullish | AlertType::MacdBearish => {
            let (Some(macd), Some(signal)) = (view.indicator(MACD), view.indicator(MACD_SIGNAL))
            else {
                return Evaluation::quiet();
            };
            // A cross needs a previous sample on both lines.
            let (Some(prev_macd), Some(prev_signal)) = (macd.previous, signal.previous) else {
                return Evaluation::quiet();
            };

            let crossed = if alert.alert_type == AlertType::MacdBullish {
                prev_macd <= prev_signal && macd.current > signal.current
            } else {
                prev_macd >= prev_signal && macd.current < signal.current
            };
            // Each cross fires once; a rearm needs a newer sample.
            let sample_at = macd.updated_at.max(signal.updated_at);
            let fresh = !alert.last_signal_at.is_some_and(|seen| sample_at <= seen);
            let hit = crossed && fresh;

            Evaluation::decide(
                hit,
                &[
                    ("macd", macd.current),
                    ("signal", signal.current),
                    ("prevMacd", prev_macd),
                    ("prevSignal", prev_signal),
                ],
            )
            .at_sample(sample_at)
        }

        AlertType::BollingerBreakout => {
            let (Some(price), Some(upper), Some(lower)) =
                (price, view.indicator(BB_UPPER), view.indicator(BB_LOWER))
            else {
                return Evaluation::quiet();
            };
            let (upper, lower) = (upper.current, lower.current);
            Evaluation::decide(
                price > upper || price < lower,
                &[("price", price), ("upper", upper), ("lower", lower)],
            )
        }
    }
}

fn fmt2(x: f64) -> String {
    format!("{:.2}", x)
}

/// Human readable line for a fired alert, built from the evaluation payload.
pub fn format_message(alert: &Alert, payload: &BTreeMap<String, f64>) -> String {
    let get = |k: &str| payload.get(k).copied().map(fmt2).unwrap_or_else(|| "?".into());
    let sym = &alert.symbol;

    match alert.alert_type {
        AlertType::PriceAbove => format!(
            "{sym} price {} is at or above {}",
            get("price"),
            get("threshold")
        ),
        AlertType::PriceBelow => format!(
            "{sym} price {} is at or below {}",
            get("price"),
            get("threshold")
        ),
        AlertType::VolumeSpike => format!(
            "{sym} volume {} reached {}x the average {}",
            get("volume"),
            get("multiplier"),
            get("avgVolume")
        ),
        AlertType::RsiOversold => format!(
            "{sym} RSI {} is oversold (threshold {})",
            get("rsi"),
            get("threshold")
        ),
        AlertType::RsiOverbought => format!(
            "{sym} RSI {} is overbought (threshold {})",
            get("rsi"),
            get("threshold")
        ),
        AlertType::MacdBullish => format!(
            "{sym} MACD {} crossed above signal {}",
            get("macd"),
            get("signal")
        ),
        AlertType::MacdBearish => format!(
            "{sym} MACD {} crossed below signal {}",
            get("macd"),
            get("signal")
        ),
        AlertType::BollingerBreakout => {
            let above = payload
                .get("price")
                .zip(payload.get("upper"))
                .is_some_and(|(p, u)| p > u);
            let side = if above { "upper" } else { "lower" };
            format!(
                "{sym} price {} broke the {side} Bollinger band ({} / {})",
                get("price"),
                get("lower"),
                get("upper")
            )
        }
    }
}
