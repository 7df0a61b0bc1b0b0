//! Library entrypoint for alertwatch.
//!
//! The binary only wires settings, storage and the feed together; everything
//! else lives here so integration tests under `tests/` can build an engine
//! and the router directly.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;

pub mod services;

pub mod controllers;
pub mod routes;

pub use error::{AlertError, PersistError};
pub use services::engine::{AlertEngine, TickReport};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AlertEngine>,
    pub events: services::notifier::EventBus,
    pub settings: config::Settings,
}
