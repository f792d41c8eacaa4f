//! Structured combat event emission into the state timeline.

use ashfall_core::events::{CombatEventName, TimelineEvent};
use ashfall_core::state::GameState;

/// Append a combat event stamped with wall and simulated time.
pub fn emit(state: &mut GameState, name: CombatEventName, now_real: f64, payload: serde_json::Value) {
    let total = state.total_minutes();
    state
        .timeline
        .push(TimelineEvent::combat(name, now_real, total, payload));
}
