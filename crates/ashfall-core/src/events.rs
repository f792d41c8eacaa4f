//! Timeline events appended to the game state for observability.

use serde::{Deserialize, Serialize};

/// Name of a structured combat event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatEventName {
    CombatStarted,
    StaminaInsufficient,
    AttackMissed,
    AttackResolved,
    PlayerAttack,
    AreaAttack,
    HeavyCleave,
    Throw,
    ThrowSplash,
    StatusTick,
    QteOffenseSuccess,
    QteOffenseFail,
    QteDefenseSuccess,
    QteDefenseFail,
    FocusSet,
    FocusAutoSwitch,
    PlayerEscape,
    PlayerEscapeFail,
    CombatEnded,
    LootDropped,
    EnemySpawned,
    SuccessfulHunt,
    PreyEscaped,
    SuccessfulCapture,
    SuccessfulNegotiation,
}

/// An entry in the append-only timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEvent {
    /// Structured combat step with wall and simulated timestamps.
    Combat {
        event: CombatEventName,
        /// Wall-clock epoch seconds.
        time: f64,
        /// Simulated total-minutes.
        total_minutes: i64,
        #[serde(default)]
        payload: serde_json::Value,
    },
    /// Narrative event fired by the event system.
    Event {
        text: String,
        timestamp: i64,
        day: i64,
        location: String,
    },
}

impl TimelineEvent {
    pub fn combat(
        event: CombatEventName,
        time: f64,
        total_minutes: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self::Combat {
            event,
            time,
            total_minutes,
            payload,
        }
    }

    /// The combat event name, if this is a combat entry.
    pub fn combat_name(&self) -> Option<CombatEventName> {
        match self {
            Self::Combat { event, .. } => Some(*event),
            _ => None,
        }
    }
}
