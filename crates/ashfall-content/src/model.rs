//! World hierarchy — pure data, no loading or validation logic.
//!
//! Built once from declarative content at boot and immutable thereafter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Visibility predicate gating an interactable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibleFlag {
    IsDaytime,
    IsMorning,
    IsRainy,
    IsSpring,
    HasExaminedMarker,
}

/// A passage out of a micro room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exit {
    /// Free-form direction token (`nord`, `sentiero`, ...).
    pub direction: String,
    pub target_micro: String,
    #[serde(default)]
    pub target_macro: Option<String>,
    #[serde(default)]
    pub locked: bool,
    /// Flag whose truthiness unlocks a locked exit.
    #[serde(default)]
    pub lock_flag: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Reference to an interactable object placed in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractableRef {
    pub id: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub visible_flag: Option<VisibleFlag>,
}

/// Smallest navigable unit; owns an ordered exit list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroRoom {
    pub id: String,
    pub name: String,
    pub short: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub exits: Vec<Exit>,
    #[serde(default)]
    pub interactables: Vec<InteractableRef>,
}

/// A region grouping micro rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroRoom {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub micro_rooms: BTreeMap<String, MicroRoom>,
}

/// The immutable world graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub macro_rooms: BTreeMap<String, MacroRoom>,
}

impl World {
    pub fn find_micro(&self, macro_id: &str, micro_id: &str) -> Option<&MicroRoom> {
        self.macro_rooms.get(macro_id)?.micro_rooms.get(micro_id)
    }

    pub fn all_micro_rooms(&self) -> impl Iterator<Item = &MicroRoom> {
        self.macro_rooms
            .values()
            .flat_map(|m| m.micro_rooms.values())
    }
}
