use thiserror::Error;

use crate::models::AlertState;

/// Failure of the durable alert sink. Never fatal for the running engine.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("alert not found: {0}")]
    NotFound(String),

    #[error("alert {id} cannot leave state {from:?} this way")]
    InvalidTransition { id: String, from: AlertState },

    /// The mutation was applied in memory; only the write failed.
    #[error("alert {alert_id:?} applied but not persisted: {source}")]
    Persistence {
        alert_id: Option<String>,
        #[source]
        source: PersistError,
    },
}

impl AlertError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AlertError::Validation(msg.into())
    }
}
