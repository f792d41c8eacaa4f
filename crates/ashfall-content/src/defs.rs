//! Data definitions for combat and inventory content.
//!
//! These are the normalized, fully-defaulted forms; `defaults` builds
//! them from the looser raw JSON shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ashfall_core::enums::{AiState, DamageType, MoveType, WeaponClass};
use ashfall_core::state::FlagValue;

/// A status effect granted by a move or weapon: `(effect, duration
/// ticks, intensity)`. JSON shape is a 3-element array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectSpec(pub String, pub i32, pub f64);

/// One move a weapon offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovesetEntry {
    pub stamina_cost: i32,
    pub windup: i32,
    pub recovery: i32,
    pub damage_multiplier: f64,
    pub status_effects: Vec<StatusEffectSpec>,
}

impl Default for MovesetEntry {
    fn default() -> Self {
        Self {
            stamina_cost: 10,
            windup: 1,
            recovery: 1,
            damage_multiplier: 1.0,
            status_effects: Vec::new(),
        }
    }
}

/// Fully-defaulted weapon definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponDef {
    pub id: String,
    pub name: String,
    pub weapon_class: WeaponClass,
    pub damage: f64,
    pub damage_type: DamageType,
    pub reach: i32,
    pub noise_level: i32,
    pub movesets: BTreeMap<MoveType, MovesetEntry>,
    /// Weapon-level effects applied by every move.
    #[serde(default)]
    pub status_effects: Vec<StatusEffectSpec>,
    #[serde(default)]
    pub tags: Vec<String>,
    // Ranged
    #[serde(default)]
    pub clip_size: i32,
    #[serde(default)]
    pub ammo_in_clip: i32,
    #[serde(default)]
    pub ammo_reserve: i32,
    /// Simulated minutes a reload costs.
    #[serde(default)]
    pub reload_time: i64,
    // Throwable
    #[serde(default)]
    pub uses: i32,
    /// Fraction of base damage splashed onto other live enemies.
    #[serde(default)]
    pub aoe_factor: f64,
    // Heavy
    #[serde(default)]
    pub cleave_targets: i32,
    #[serde(default)]
    pub cleave_factor: f64,
}

impl WeaponDef {
    pub fn is_ranged(&self) -> bool {
        self.weapon_class == WeaponClass::Ranged
    }

    pub fn is_throwable(&self) -> bool {
        self.weapon_class == WeaponClass::Throwable
    }
}

/// An entry in a mob loot table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootEntry {
    pub item: String,
    #[serde(default = "default_chance")]
    pub chance: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Quantity override when the mob is captured rather than killed.
    #[serde(default)]
    pub captured_bonus: Option<u32>,
}

fn default_chance() -> f64 {
    1.0
}

fn default_quantity() -> u32 {
    1
}

/// One possible outcome of negotiating with a mob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub loot: Option<String>,
}

/// Behavioral knobs for passive-mob interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehavioralTraits {
    pub is_animal: bool,
    pub flee_chance: f64,
    /// `negative`, `neutral`, or `none`.
    pub moral_impact: String,
    pub surrender_complete: bool,
    pub has_hidden_weapon: bool,
    pub hidden_weapon_damage: i32,
    pub can_negotiate: bool,
    pub becomes_hostile_on_failed_negotiation: bool,
    pub has_family_photo: bool,
    pub has_personal_story: bool,
}

impl Default for BehavioralTraits {
    fn default() -> Self {
        Self {
            is_animal: false,
            flee_chance: 0.3,
            moral_impact: "none".to_string(),
            surrender_complete: true,
            has_hidden_weapon: false,
            hidden_weapon_damage: 5,
            can_negotiate: false,
            becomes_hostile_on_failed_negotiation: false,
            has_family_photo: false,
            has_personal_story: false,
        }
    }
}

/// Fully-defaulted mob definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobDef {
    pub id: String,
    pub name: String,
    pub hp: i32,
    pub attack: i32,
    pub max_stamina: i32,
    pub max_posture: f64,
    pub stagger_threshold: f64,
    pub weapon_handling: f64,
    pub resistances: BTreeMap<DamageType, f64>,
    pub ai_state: AiState,
    pub ai_traits: BTreeMap<String, FlagValue>,
    #[serde(default)]
    pub behavioral_traits: BehavioralTraits,
    #[serde(default)]
    pub loot_table: Vec<LootEntry>,
    #[serde(default)]
    pub negotiation_outcomes: Vec<NegotiationOutcome>,
    // Per-encounter difficulty knobs.
    pub attack_interval_minutes: i64,
    pub attack_damage_multiplier: f64,
    pub attack_interval_multiplier: f64,
    #[serde(default)]
    pub defensive_qte_window: Option<i64>,
    #[serde(default)]
    pub qte_chance: f64,
}

/// Effect an item applies on use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEffect {
    HealHp { amount: i32 },
    RestoreStamina { amount: i32 },
    StatModifier {
        stat: String,
        delta: i64,
        duration_minutes: i64,
    },
}

/// Inventory item definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default = "default_quantity")]
    pub stack_max: u32,
    #[serde(default)]
    pub effects: Vec<ItemEffect>,
    #[serde(default)]
    pub equip_slot: Option<String>,
    #[serde(default)]
    pub durability: Option<i32>,
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// An entry in a standalone loot table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootTableEntry {
    pub item: String,
    #[serde(default = "default_chance")]
    pub chance: f64,
    #[serde(default = "default_quantity")]
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub conditions: Vec<serde_json::Value>,
}

/// A standalone loot table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootTableDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_quantity")]
    pub max_rolls: u32,
    #[serde(default)]
    pub guaranteed_rolls: u32,
    pub entries: Vec<LootTableEntry>,
}

/// A crafting input, `[id, qty]` or `{item, quantity}` in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipeInput {
    Pair(String, u32),
    Named { item: String, quantity: u32 },
}

impl RecipeInput {
    pub fn item(&self) -> &str {
        match self {
            Self::Pair(id, _) => id,
            Self::Named { item, .. } => item,
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            Self::Pair(_, q) => *q,
            Self::Named { quantity, .. } => *quantity,
        }
    }
}

/// Crafting recipe definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDef {
    pub id: String,
    pub name: String,
    pub inputs: Vec<RecipeInput>,
    /// `[item_id, quantity]`.
    pub output: (String, u32),
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}
