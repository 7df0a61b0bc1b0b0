//! Alert lifecycle: state derivation and the transitions between states.
//!
//! Every transition returns the `(from, to)` pair so callers can publish a
//! state change only when something actually moved.

use crate::models::{Alert, AlertState};

pub type Transition = (AlertState, AlertState);

pub fn state_of(alert: &Alert) -> AlertState {
    if !alert.enabled {
        if alert.is_exhausted() {
            AlertState::Exhausted
        } else {
            AlertState::Disabled
        }
    } else if alert.triggered {
        AlertState::Triggered
    } else {
        AlertState::Armed
    }
}

/// True once a latched alert has sat out its cooldown.
pub fn rearm_due(alert: &Alert, now: i64) -> bool {
    if state_of(alert) != AlertState::Triggered {
        return false;
    }
    match alert.last_triggered_at {
        Some(at) => now.saturating_sub(at) >= alert.cooldown_ms,
        None => true,
    }
}

/// Triggered -> Armed after the cooldown. Counters are kept.
pub fn rearm(alert: &mut Alert, now: i64) -> Option<Transition> {
    if !rearm_due(alert, now) {
        return None;
    }
    alert.triggered = false;
    Some((AlertState::Triggered, AlertState::Armed))
}

/// Records a firing on an Armed alert. Returns None if the alert was not Armed.
pub fn apply_trigger(alert: &mut Alert, now: i64) -> Option<Transition> {
    if state_of(alert) != AlertState::Armed || alert.is_exhausted() {
        return None;
    }

    alert.trigger_count = alert.trigger_count.saturating_add(1);
    alert.last_triggered_at = Some(match alert.last_triggered_at {
        Some(prev) => prev.max(now),
        None => now,
    });
    alert.triggered = true;

    if alert.is_exhausted() {
        alert.enabled = false;
    }

    Some((AlertState::Armed, state_of(alert)))
}

pub fn disable(alert: &mut Alert) -> Option<Transition> {
    let from = state_of(alert);
    match from {
        AlertState::Armed | AlertState::Triggered => {
            alert.enabled = false;
            Some((from, AlertState::Disabled))
        }
        AlertState::Disabled | AlertState::Exhausted => None,
    }
}

/// Disabled -> Armed. `Err` carries the blocking state when the alert is Exhausted.
pub fn enable(alert: &mut Alert) -> Result<Option<Transition>, AlertState> {
    match state_of(alert) {
        AlertState::Disabled => {
            alert.enabled = true;
            alert.triggered = false;
            Ok(Some((AlertState::Disabled, AlertState::Armed)))
        }
        AlertState::Exhausted => Err(AlertState::Exhausted),
        AlertState::Armed | AlertState::Triggered => Ok(None),
    }
}

/// Back to a fresh Armed alert from any state.
pub fn reset(alert: &mut Alert) -> Option<Transition> {
    let from = state_of(alert);
    alert.enabled = true;
    alert.triggered = false;
    alert.trigger_count = 0;
    alert.last_triggered_at = None;

    (from != AlertState::Armed).then_some((from, AlertState::Armed))
}
