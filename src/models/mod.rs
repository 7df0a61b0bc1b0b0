pub mod alert;
pub mod event;
pub mod market;

pub use alert::{
    Alert, AlertAction, AlertConfig, AlertState, AlertStats, AlertType, NotificationChannel,
};
pub use event::{AlertStateChanged, EngineEvent, TriggerEvent};
pub use market::{IndicatorSnapshot, MarketSnapshot, SymbolView};
