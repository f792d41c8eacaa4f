//! Room events: declarative conditions and effects mapped to
//! on-enter/on-exit triggers per location.
//!
//! One-time events live in the state's fired set forever; cooldowns are
//! tracked in simulated minutes since the last fire.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use ashfall_core::enums::Weather;
use ashfall_core::events::TimelineEvent;
use ashfall_core::state::{FlagValue, GameState};

/// A condition guarding an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCondition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub negate: bool,
}

/// An effect applied when an event fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEffect {
    ShowMessage { text: String },
    SetFlag { key: String, value: FlagValue },
    AddItem { key: String },
    RemoveItem { key: String },
    TimelineEvent { text: String },
    ChangeWeather { key: String },
    AdvanceTime { value: i64 },
}

/// A declarative game event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type", default = "default_event_type")]
    pub kind: String,
    #[serde(default)]
    pub conditions: Vec<EventCondition>,
    #[serde(default)]
    pub effects: Vec<EventEffect>,
    #[serde(default = "default_chance")]
    pub chance: f64,
    #[serde(default)]
    pub cooldown_minutes: i64,
    #[serde(default)]
    pub one_time: bool,
}

fn default_event_type() -> String {
    "narrative".to_string()
}

fn default_chance() -> f64 {
    1.0
}

/// Event ids bound to a room's entry and exit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomEventBindings {
    pub on_enter: Vec<String>,
    pub on_exit: Vec<String>,
}

/// Room trigger direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomTrigger {
    OnEnter,
    OnExit,
}

/// Loaded event definitions plus per-room bindings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSystem {
    pub events: BTreeMap<String, Event>,
    /// `macro:micro` location key -> bindings.
    pub room_events: BTreeMap<String, RoomEventBindings>,
}

impl EventSystem {
    /// Parse the events document: `{events: {...}, room_events: {...}}`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(default)]
            events: BTreeMap<String, EventBody>,
            #[serde(default)]
            room_events: BTreeMap<String, RoomEventBindings>,
        }
        #[derive(Deserialize)]
        struct EventBody {
            #[serde(rename = "type", default = "default_event_type")]
            kind: String,
            #[serde(default)]
            conditions: Vec<EventCondition>,
            #[serde(default)]
            effects: Vec<EventEffect>,
            #[serde(default = "default_chance")]
            chance: f64,
            #[serde(default)]
            cooldown_minutes: i64,
            #[serde(default)]
            one_time: bool,
        }
        let doc: Doc = serde_json::from_value(value)?;
        let events = doc
            .events
            .into_iter()
            .map(|(id, body)| {
                (
                    id.clone(),
                    Event {
                        id,
                        kind: body.kind,
                        conditions: body.conditions,
                        effects: body.effects,
                        chance: body.chance,
                        cooldown_minutes: body.cooldown_minutes,
                        one_time: body.one_time,
                    },
                )
            })
            .collect();
        Ok(Self {
            events,
            room_events: doc.room_events,
        })
    }

    /// Evaluate one condition against the state.
    pub fn check_condition(condition: &EventCondition, state: &GameState) -> bool {
        let result = match condition.kind.as_str() {
            "flag" => match &condition.value {
                Some(expected) => {
                    let actual = state.flags.get(&condition.key);
                    match (actual, expected) {
                        (Some(FlagValue::Bool(a)), serde_json::Value::Bool(b)) => a == b,
                        (Some(FlagValue::Int(a)), serde_json::Value::Number(b)) => {
                            b.as_i64() == Some(*a)
                        }
                        (Some(FlagValue::Text(a)), serde_json::Value::String(b)) => a == b,
                        _ => false,
                    }
                }
                None => state.flag_truthy(&condition.key),
            },
            "location" => state.location_key() == condition.key,
            "location_contains" => state.location_key().contains(&condition.key),
            "daytime" => state.clock.daytime.as_str() == condition.key,
            "weather" => state.clock.weather.as_str() == condition.key,
            "day_count" => {
                let threshold = condition.value.as_ref().and_then(|v| v.as_i64()).unwrap_or(1);
                state.clock.day_count >= threshold
            }
            "time_minutes" => {
                let threshold = condition.value.as_ref().and_then(|v| v.as_i64()).unwrap_or(0);
                state.clock.time_minutes >= threshold
            }
            "visited" => state.visited_micro.contains(&condition.key),
            "has_item" => state.item_count(&condition.key) > 0,
            other => {
                log::warn!("unknown event condition type '{other}'");
                false
            }
        };
        result != condition.negate
    }

    /// Apply one effect, returning display messages.
    fn apply_effect(effect: &EventEffect, state: &mut GameState) -> Vec<String> {
        match effect {
            EventEffect::ShowMessage { text } => vec![text.clone()],
            EventEffect::SetFlag { key, value } => {
                state.flags.insert(key.clone(), value.clone());
                Vec::new()
            }
            EventEffect::AddItem { key } => {
                if !state.legacy_inventory.contains(key) {
                    state.legacy_inventory.push(key.clone());
                    return vec![format!("Hai ottenuto: {key}")];
                }
                Vec::new()
            }
            EventEffect::RemoveItem { key } => {
                if let Some(pos) = state.legacy_inventory.iter().position(|i| i == key) {
                    state.legacy_inventory.remove(pos);
                    return vec![format!("Hai perso: {key}")];
                }
                Vec::new()
            }
            EventEffect::TimelineEvent { text } => {
                let entry = TimelineEvent::Event {
                    text: text.clone(),
                    timestamp: state.clock.time_minutes,
                    day: state.clock.day_count,
                    location: state.location_key(),
                };
                state.timeline.push(entry);
                Vec::new()
            }
            EventEffect::ChangeWeather { key } => match Weather::parse(key) {
                Some(weather) => {
                    state.clock.weather = weather;
                    vec![format!("Il tempo cambia: {key}")]
                }
                None => {
                    log::warn!("change_weather with unknown weather '{key}'");
                    Vec::new()
                }
            },
            EventEffect::AdvanceTime { value } => {
                state.clock.wait(*value);
                vec![format!("Il tempo avanza di {value} minuti")]
            }
        }
    }

    /// Cooldown / one-time / chance gate.
    fn can_trigger<R: Rng>(&self, event: &Event, state: &GameState, rng: &mut R) -> bool {
        if event.one_time && state.fired_events.contains(&event.id) {
            return false;
        }
        if event.cooldown_minutes > 0 {
            if let Some(last) = state.event_cooldowns.get(&event.id) {
                if state.total_minutes() - last < event.cooldown_minutes {
                    return false;
                }
            }
        }
        if event.chance < 1.0 && rng.gen::<f64>() > event.chance {
            return false;
        }
        true
    }

    /// Fire one event if its gates and conditions pass. Returns display
    /// messages; empty when the event did not fire.
    pub fn trigger_event<R: Rng>(
        &self,
        event_id: &str,
        state: &mut GameState,
        rng: &mut R,
    ) -> Vec<String> {
        let Some(event) = self.events.get(event_id) else {
            return Vec::new();
        };
        if !self.can_trigger(event, state, rng) {
            return Vec::new();
        }
        if !event
            .conditions
            .iter()
            .all(|c| Self::check_condition(c, state))
        {
            return Vec::new();
        }
        let mut messages = Vec::new();
        for effect in &event.effects {
            messages.extend(Self::apply_effect(effect, state));
        }
        state.fired_events.insert(event.id.clone());
        if event.cooldown_minutes > 0 {
            state
                .event_cooldowns
                .insert(event.id.clone(), state.total_minutes());
        }
        messages
    }

    /// Fire the events bound to a room for the given trigger direction.
    pub fn process_room_events<R: Rng>(
        &self,
        location_key: &str,
        trigger: RoomTrigger,
        state: &mut GameState,
        rng: &mut R,
    ) -> Vec<String> {
        let Some(bindings) = self.room_events.get(location_key) else {
            return Vec::new();
        };
        let ids = match trigger {
            RoomTrigger::OnEnter => bindings.on_enter.clone(),
            RoomTrigger::OnExit => bindings.on_exit.clone(),
        };
        let mut messages = Vec::new();
        for id in ids {
            messages.extend(self.trigger_event(&id, state, rng));
        }
        messages
    }
}
