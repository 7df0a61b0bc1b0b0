//! Durable storage for alert records.
//!
//! The store always rewrites the full record list; sinks decide how to make
//! that cheap.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::{error::PersistError, models::Alert};

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Every stored alert, in no particular order.
    async fn load(&self) -> Result<Vec<Alert>, PersistError>;

    /// Replace the stored collection with `alerts`.
    async fn save_all(&self, alerts: &[Alert]) -> Result<(), PersistError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// In-process sink for tests and throwaway runs.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Alert>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Alert>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Makes every following `save_all` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<Alert> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AlertSink for MemorySink {
    async fn load(&self) -> Result<Vec<Alert>, PersistError> {
        Ok(self.records())
    }

    async fn save_all(&self, alerts: &[Alert]) -> Result<(), PersistError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistError::Unavailable("memory sink set to fail".into()));
        }
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = alerts.to_vec();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Pretty-printed JSON array on disk. Writes go to a temp file that is then
/// renamed over the target, so a crash never leaves a half-written file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AlertSink for JsonFileSink {
    async fn load(&self) -> Result<Vec<Alert>, PersistError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save_all(&self, alerts: &[Alert]) -> Result<(), PersistError> {
        let json = serde_json::to_vec_pretty(alerts)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}
