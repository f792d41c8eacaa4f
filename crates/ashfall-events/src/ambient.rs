//! Ambient events: periodic environmental storytelling.
//!
//! Polling is globally rate-limited to one pass every five simulated
//! minutes, and each pass triggers at most one event. Every event
//! carries its own frequency cooldown and chance.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use ashfall_core::constants::AMBIENT_EVENT_POLL_MINUTES;
use ashfall_core::state::GameState;

use crate::events::{EventCondition, EventSystem};

/// An ambient event with a message pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbientEvent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub messages: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<EventCondition>,
    /// Minutes between possible triggers of this event.
    pub frequency: i64,
    pub chance: f64,
    /// Flag-keyed message pools that override the default pool.
    #[serde(default)]
    pub conditional_messages: BTreeMap<String, Vec<String>>,
}

/// Loaded ambient events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientEventSystem {
    pub events: BTreeMap<String, AmbientEvent>,
}

impl AmbientEventSystem {
    /// Parse `{ambient_events: [...]}`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(default)]
            ambient_events: Vec<AmbientEvent>,
        }
        let doc: Doc = serde_json::from_value(value)?;
        Ok(Self {
            events: doc
                .ambient_events
                .into_iter()
                .map(|e| (e.id.clone(), e))
                .collect(),
        })
    }

    fn cooldown_key(event_id: &str) -> String {
        format!("ambient:{event_id}")
    }

    fn pick_message<R: Rng>(event: &AmbientEvent, state: &GameState, rng: &mut R) -> Option<String> {
        for (flag, pool) in &event.conditional_messages {
            if state.flag_truthy(flag) && !pool.is_empty() {
                return Some(pool[rng.gen_range(0..pool.len())].clone());
            }
        }
        if event.messages.is_empty() {
            return None;
        }
        Some(event.messages[rng.gen_range(0..event.messages.len())].clone())
    }

    /// Poll for at most one ambient event. Respects the global
    /// five-minute gate and each event's frequency cooldown.
    pub fn poll<R: Rng>(&self, state: &mut GameState, rng: &mut R) -> Option<String> {
        let now_total = state.total_minutes();
        if now_total - state.last_ambient_check < AMBIENT_EVENT_POLL_MINUTES {
            return None;
        }
        state.last_ambient_check = now_total;

        for event in self.events.values() {
            let key = Self::cooldown_key(&event.id);
            if let Some(last) = state.event_cooldowns.get(&key) {
                if now_total - last < event.frequency {
                    continue;
                }
            }
            if rng.gen::<f64>() > event.chance {
                continue;
            }
            if !event
                .conditions
                .iter()
                .all(|c| EventSystem::check_condition(c, state))
            {
                continue;
            }
            let Some(message) = Self::pick_message(event, state, rng) else {
                continue;
            };
            state.event_cooldowns.insert(key, now_total);
            return Some(message);
        }
        None
    }
}
