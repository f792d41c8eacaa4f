//! Condition evaluation against the game state.

use ashfall_core::enums::Weather;
use ashfall_core::state::{FlagValue, GameState};

use crate::model::Condition;

fn time_to_minutes(text: &str) -> Option<i64> {
    let (h, m) = text.split_once(':')?;
    let hours: i64 = h.parse().ok()?;
    let minutes: i64 = m.parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Evaluate one condition. Unknown operators are false.
pub fn check(condition: &Condition, state: &GameState) -> bool {
    match condition {
        Condition::HasItem { id, qty } => state.item_count(id) >= *qty,
        Condition::FlagIs { key, value } => {
            let actual = state.flags.get(key).cloned().unwrap_or(FlagValue::Bool(false));
            actual == *value
        }
        Condition::InLocation {
            world,
            macro_room,
            micro,
        } => {
            if world.as_deref().is_some_and(|w| w != state.world_id) {
                return false;
            }
            if macro_room.as_deref().is_some_and(|m| m != state.current_macro) {
                return false;
            }
            if micro.as_deref().is_some_and(|m| m != state.current_micro) {
                return false;
            }
            true
        }
        Condition::StatGte { name, value } => {
            let current = if state.stats.base.contains_key(name) {
                state.stats.get(name)
            } else {
                // Content that predates the stats map keeps counters in
                // flags.
                state.flags.get(name).and_then(FlagValue::as_int).unwrap_or(0)
            };
            current >= *value
        }
        Condition::RelationGte { npc, field, value } => {
            let key = match field.as_deref() {
                Some(f) if f != "affinity" => format!("{npc}.{f}"),
                _ => npc.clone(),
            };
            state.relationships.get(&key).copied().unwrap_or(0) >= *value
        }
        Condition::TimeBetween { start, end } => {
            let (Some(start), Some(end)) = (time_to_minutes(start), time_to_minutes(end)) else {
                return false;
            };
            let current = state.clock.time_minutes;
            if start <= end {
                (start..=end).contains(&current)
            } else {
                // Overnight range, e.g. 22:00-06:00.
                current >= start || current <= end
            }
        }
        Condition::WeatherIn { any } => any
            .iter()
            .filter_map(|token| Weather::parse(token))
            .any(|w| w == state.clock.weather),
        Condition::Unknown => false,
    }
}

/// All conditions must hold; an empty list holds trivially.
pub fn check_all(conditions: &[Condition], state: &GameState) -> bool {
    conditions.iter().all(|c| check(c, state))
}
