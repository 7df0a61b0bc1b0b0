use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Rolling average volume per symbol, consumed by VOLUME_SPIKE alerts.
pub trait AverageVolume: Send + Sync {
    fn record(&self, symbol: &str, volume: f64);
    fn average(&self, symbol: &str) -> Option<f64>;
}

/// Keeps the last `window` volume samples per symbol.
pub struct RollingVolume {
    window: usize,
    samples: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl RollingVolume {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: Mutex::new(HashMap::new()),
        }
    }
}

impl AverageVolume for RollingVolume {
    fn record(&self, symbol: &str, volume: f64) {
        if !volume.is_finite() || volume < 0.0 {
            return;
        }

        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = samples.entry(symbol.to_string()).or_default();
        entries.push_back(volume);

        // Trim to keep only the last `window` entries
        while entries.len() > self.window {
            entries.pop_front();
        }
    }

    fn average(&self, symbol: &str) -> Option<f64> {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = samples.get(symbol)?;
        if entries.is_empty() {
            return None;
        }
        Some(entries.iter().sum::<f64>() / entries.len() as f64)
    }
}
