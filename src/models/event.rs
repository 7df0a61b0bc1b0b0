use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::alert::{AlertAction, AlertState, AlertType, NotificationChannel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub alert_id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub name: String,
    pub message: String,
    pub payload: BTreeMap<String, f64>,
    pub timestamp: i64,
    pub channels: BTreeSet<NotificationChannel>,
    pub actions: Vec<AlertAction>,
    pub trigger_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStateChanged {
    pub alert_id: String,
    pub symbol: String,
    pub from: AlertState,
    pub to: AlertState,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EngineEvent {
    Trigger(TriggerEvent),
    StateChanged(AlertStateChanged),
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Trigger(_) => "trigger",
            EngineEvent::StateChanged(_) => "stateChanged",
        }
    }

    pub fn alert_id(&self) -> &str {
        match self {
            EngineEvent::Trigger(t) => &t.alert_id,
            EngineEvent::StateChanged(s) => &s.alert_id,
        }
    }
}
