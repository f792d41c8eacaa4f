//! Quest data models: quests, steps, conditions, rewards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ashfall_core::state::FlagValue;

/// FSM states. Completion and failure are terminal; abandonment is
/// legal only for side quests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestState {
    #[default]
    NotStarted,
    Available,
    InProgress,
    Blocked,
    Completed,
    Failed,
    Abandoned,
}

impl QuestState {
    /// Active states participate in the runtime tick.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::Blocked)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestPriority {
    #[default]
    Main,
    Side,
}

fn default_qty() -> u32 {
    1
}

fn default_flag_true() -> FlagValue {
    FlagValue::Bool(true)
}

/// A declarative condition, evaluated against the game state.
///
/// JSON shape: `{"op": "has_item", "args": {"id": "bandage", "qty": 1}}`.
/// Unknown operators evaluate to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Condition {
    HasItem {
        id: String,
        #[serde(default = "default_qty")]
        qty: u32,
    },
    FlagIs {
        key: String,
        #[serde(default = "default_flag_true")]
        value: FlagValue,
    },
    InLocation {
        #[serde(default)]
        world: Option<String>,
        #[serde(rename = "macro", default)]
        macro_room: Option<String>,
        #[serde(default)]
        micro: Option<String>,
    },
    StatGte {
        name: String,
        #[serde(default)]
        value: i64,
    },
    RelationGte {
        npc: String,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        value: i64,
    },
    /// `HH:MM` inclusive bounds; an overnight range wraps midnight.
    TimeBetween { start: String, end: String },
    WeatherIn {
        any: Vec<String>,
    },
    #[serde(other)]
    Unknown,
}

/// A single step within a quest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enter_conditions: Vec<Condition>,
    #[serde(default)]
    pub complete_conditions: Vec<Condition>,
    #[serde(default)]
    pub on_enter_flags: BTreeMap<String, FlagValue>,
    #[serde(default)]
    pub on_complete_flags: BTreeMap<String, FlagValue>,
}

/// An item grant inside a reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReward {
    pub id: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
}

/// Rewards granted on quest completion or failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Reward {
    pub items: Vec<ItemReward>,
    pub stats: BTreeMap<String, i64>,
    /// Keys are `npc` or `npc.field`.
    pub relation: BTreeMap<String, i64>,
    pub flags: BTreeMap<String, FlagValue>,
}

/// A quest with ordered steps and journal nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub act: Option<String>,
    #[serde(default)]
    pub priority: QuestPriority,
    #[serde(default)]
    pub state: QuestState,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub current_step_index: usize,
    #[serde(default)]
    pub prerequisites: Vec<Condition>,
    #[serde(default)]
    pub fail_conditions: Vec<Condition>,
    #[serde(default)]
    pub rewards_on_complete: Reward,
    #[serde(default)]
    pub rewards_on_fail: Reward,
    /// `q.<quest>.<step>.<variant>` -> narrative text.
    #[serde(default)]
    pub journal_nodes: BTreeMap<String, String>,
}

impl Quest {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            act: None,
            priority: QuestPriority::Main,
            state: QuestState::NotStarted,
            steps: Vec::new(),
            current_step_index: 0,
            prerequisites: Vec::new(),
            fail_conditions: Vec::new(),
            rewards_on_complete: Reward::default(),
            rewards_on_fail: Reward::default(),
            journal_nodes: BTreeMap::new(),
        }
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_parses_from_op_args_shape() {
        let c: Condition = serde_json::from_value(serde_json::json!({
            "op": "has_item", "args": {"id": "bandage"}
        }))
        .unwrap();
        assert_eq!(
            c,
            Condition::HasItem {
                id: "bandage".into(),
                qty: 1
            }
        );
    }

    #[test]
    fn unknown_op_parses_to_unknown() {
        let c: Condition = serde_json::from_value(serde_json::json!({
            "op": "phase_of_moon", "args": {"phase": "full"}
        }))
        .unwrap();
        assert_eq!(c, Condition::Unknown);
    }

    #[test]
    fn in_location_accepts_macro_keyword() {
        let c: Condition = serde_json::from_value(serde_json::json!({
            "op": "in_location", "args": {"macro": "kitchen"}
        }))
        .unwrap();
        match c {
            Condition::InLocation { macro_room, .. } => {
                assert_eq!(macro_room.as_deref(), Some("kitchen"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn quest_roundtrips() {
        let mut quest = Quest::new("q1", "Find the bandage");
        quest.steps.push(Step {
            id: "s0".into(),
            title: "Reach the kitchen".into(),
            description: String::new(),
            enter_conditions: vec![],
            complete_conditions: vec![Condition::InLocation {
                world: None,
                macro_room: Some("kitchen".into()),
                micro: None,
            }],
            on_enter_flags: BTreeMap::new(),
            on_complete_flags: BTreeMap::new(),
        });
        let json = serde_json::to_string(&quest).unwrap();
        let back: Quest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.steps.len(), 1);
        assert_eq!(back.state, QuestState::NotStarted);
    }
}
