pub mod clock;
pub mod market_cache;
pub mod volume_window;
pub mod evaluator;
pub mod scheduler;

pub mod alert_sink;
pub mod mongo_sink;
pub mod db_init;
pub mod alert_store;

pub mod notifier;
pub mod engine;
pub mod alert_monitor;
pub mod finnhub;
