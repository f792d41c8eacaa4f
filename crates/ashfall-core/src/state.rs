//! Mutable game state — the single runtime container every action
//! mutates. Serialized wholesale into save snapshots.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::clock::GameClock;
use crate::constants::*;
use crate::enums::*;
use crate::events::TimelineEvent;
use crate::inventory::{Equipment, Inventory};
use crate::stats::PlayerStats;

/// A flag value: bool, integer, or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    /// Truthiness used by lock predicates and event conditions.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Text(s) => !s.is_empty(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<bool> for FlagValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FlagValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FlagValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One applied status effect with remaining duration and intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectInstance {
    pub effect: StatusEffect,
    /// Remaining ticks.
    pub duration: i32,
    pub intensity: f64,
    pub source: Option<String>,
}

/// Per-entity combat bookkeeping: stamina, posture, effects, AI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub stamina: i32,
    pub max_stamina: i32,
    pub posture: f64,
    pub max_posture: f64,
    /// Fraction of max posture below which the entity staggers.
    pub stagger_threshold: f64,
    /// Weapon skill in `[0, 1]`.
    pub weapon_handling: f64,
    /// Damage multiplier per type; 1.0 is neutral, absent means neutral.
    pub resistances: BTreeMap<DamageType, f64>,
    pub effects: Vec<StatusEffectInstance>,
    pub ai_state: AiState,
    /// Free-form AI flags (`pack_hunter`, `always_aggressive`, ...).
    pub ai_traits: BTreeMap<String, FlagValue>,
}

impl Combatant {
    pub fn player() -> Self {
        Self {
            stamina: PLAYER_MAX_STAMINA,
            max_stamina: PLAYER_MAX_STAMINA,
            posture: PLAYER_MAX_POSTURE,
            max_posture: PLAYER_MAX_POSTURE,
            stagger_threshold: PLAYER_STAGGER_THRESHOLD,
            weapon_handling: PLAYER_WEAPON_HANDLING,
            resistances: BTreeMap::new(),
            effects: Vec::new(),
            ai_state: AiState::Aggressive,
            ai_traits: BTreeMap::new(),
        }
    }

    pub fn stamina_ratio(&self) -> f64 {
        if self.max_stamina == 0 {
            return 0.0;
        }
        self.stamina as f64 / self.max_stamina as f64
    }

    pub fn posture_ratio(&self) -> f64 {
        if self.max_posture <= 0.0 {
            return 0.0;
        }
        self.posture / self.max_posture
    }

    pub fn trait_flag(&self, name: &str) -> bool {
        self.ai_traits.get(name).is_some_and(FlagValue::truthy)
    }

    pub fn set_trait(&mut self, name: &str, value: bool) {
        self.ai_traits.insert(name.to_string(), value.into());
    }
}

/// An enemy attack that has been wound up and waits for the defensive
/// window to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingAttack {
    pub damage: i32,
    pub deadline_total: i64,
}

/// One enemy in the active session, with its own attack countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyEntry {
    /// Session-unique id; collisions get `_2`, `_3`, ... suffixes.
    pub id: String,
    /// Content id the entry was spawned from.
    pub base_id: String,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    /// Simulated minutes between automatic attacks.
    pub attack_interval: i64,
    /// Total-minutes at which the next attack winds up.
    pub next_attack_total: i64,
    pub incoming: Option<IncomingAttack>,
}

impl EnemyEntry {
    pub fn alive(&self) -> bool {
        self.hp > 0
    }
}

/// The active QTE, at most one per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QteState {
    pub kind: QteKind,
    pub prompt: String,
    pub expected: String,
    pub deadline_total: i64,
    pub effect: Option<QteEffect>,
    /// Index of the attacking enemy for defensive windows.
    pub attacker_index: Option<usize>,
}

/// A multi-enemy combat session owned by the game state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatSession {
    pub enemies: Vec<EnemyEntry>,
    /// Combat bookkeeping keyed by entity id, `"player"` included.
    pub combatants: BTreeMap<String, Combatant>,
    pub focus_enemy: Option<String>,
    pub phase: CombatPhase,
    pub qte: Option<QteState>,
    pub result: Option<CombatOutcome>,
    /// Probability of an offensive QTE after a successful player hit.
    pub qte_chance: f64,
    pub defensive_qte_window: i64,
    pub offensive_qte_window: i64,
    pub distance: i32,
    pub push_decay: i32,
    /// Total-minutes before which `attack all` is not ready.
    pub attack_all_ready_total: Option<i64>,
    /// Wall-clock of the last valid player action, for the inactivity gate.
    pub last_player_action_real: f64,
    pub inactivity_attack_seconds: f64,
    pub start_total: i64,
    /// Enemy ids whose death has already been processed for loot.
    pub loot_processed: BTreeSet<String>,
}

impl CombatSession {
    pub fn ended(&self) -> bool {
        self.phase == CombatPhase::Ended
    }

    pub fn live_enemies(&self) -> impl Iterator<Item = (usize, &EnemyEntry)> {
        self.enemies.iter().enumerate().filter(|(_, e)| e.alive())
    }

    /// First live enemy, used as the primary for legacy-style displays.
    pub fn primary(&self) -> Option<&EnemyEntry> {
        self.enemies
            .iter()
            .find(|e| e.alive())
            .or_else(|| self.enemies.first())
    }

    pub fn enemy_index(&self, id: &str) -> Option<usize> {
        self.enemies.iter().position(|e| e.id == id)
    }
}

/// Runtime state of a carried weapon (clip, reserve, throwable uses).
/// The content registry stays immutable; mutation happens here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaponRuntime {
    pub ammo_in_clip: i32,
    pub ammo_reserve: i32,
    pub uses: i32,
}

/// A scene-stamped journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub quest_id: String,
    pub node_key: String,
    pub text: String,
    /// Minutes-of-day at emission time.
    pub timestamp: i64,
    pub weather: Weather,
    pub location: String,
}

/// A recorded player choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceRecord {
    pub choice_id: String,
    pub option_id: String,
    pub total_minutes: i64,
}

/// Complete mutable game state, one instance per game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub world_id: String,
    pub current_macro: String,
    pub current_micro: String,

    pub clock: GameClock,

    pub flags: BTreeMap<String, FlagValue>,
    /// Legacy flat item list kept for content that predates stacks.
    pub legacy_inventory: Vec<String>,
    pub inventory: Inventory,
    pub equipment: Equipment,
    pub stats: PlayerStats,
    pub relationships: BTreeMap<String, i64>,

    pub fired_events: BTreeSet<String>,
    /// Total-minutes of the last fire per cooldown-bearing event.
    pub event_cooldowns: BTreeMap<String, i64>,
    /// Total-minutes of the last ambient-event polling pass.
    pub last_ambient_check: i64,
    pub timeline: Vec<TimelineEvent>,

    pub player_hp: i32,
    pub player_max_hp: i32,
    pub player_weapon_id: Option<String>,
    pub weapon_states: BTreeMap<String, WeaponRuntime>,
    pub combat: Option<CombatSession>,

    pub visited_micro: BTreeSet<String>,
    pub visit_counts: BTreeMap<String, u32>,
    /// Last `(daytime|weather)` signature shown per micro room.
    pub micro_last_signature: BTreeMap<String, String>,

    // --- Ambient snippet rate limiting ---
    pub ambient_min_gap_minutes: i64,
    /// Total-minutes of the last emission; very negative so the first
    /// snippet is immediate.
    pub last_ambient_emit_total: i64,
    pub last_ambient_line: Option<String>,
    /// Test override: force the next snippet from a catalog key.
    pub force_ambient_key: Option<String>,
    /// Test override: force the next snippet text verbatim.
    pub force_ambient_exact: Option<String>,

    pub journal_history: Vec<JournalEntry>,
    pub choices_made: BTreeSet<String>,
    pub choice_history: Vec<ChoiceRecord>,

    /// Messages buffered for the next render (loot pickups).
    pub pending_messages: Vec<String>,

    /// Seed recorded for procedural generation reproduction.
    pub rng_seed: u64,
}

impl GameState {
    pub fn new(world_id: &str, current_macro: &str, current_micro: &str) -> Self {
        Self {
            world_id: world_id.to_string(),
            current_macro: current_macro.to_string(),
            current_micro: current_micro.to_string(),
            clock: GameClock::default(),
            flags: BTreeMap::new(),
            legacy_inventory: Vec::new(),
            inventory: Inventory::default(),
            equipment: Equipment::default(),
            stats: PlayerStats::default(),
            relationships: BTreeMap::new(),
            fired_events: BTreeSet::new(),
            event_cooldowns: BTreeMap::new(),
            last_ambient_check: 0,
            timeline: Vec::new(),
            player_hp: 10,
            player_max_hp: 10,
            player_weapon_id: None,
            weapon_states: BTreeMap::new(),
            combat: None,
            visited_micro: BTreeSet::new(),
            visit_counts: BTreeMap::new(),
            micro_last_signature: BTreeMap::new(),
            ambient_min_gap_minutes: AMBIENT_MIN_GAP_MINUTES,
            last_ambient_emit_total: -10_000,
            last_ambient_line: None,
            force_ambient_key: None,
            force_ambient_exact: None,
            journal_history: Vec::new(),
            choices_made: BTreeSet::new(),
            choice_history: Vec::new(),
            pending_messages: Vec::new(),
            rng_seed: 0,
        }
    }

    pub fn total_minutes(&self) -> i64 {
        self.clock.total_minutes()
    }

    pub fn location_key(&self) -> String {
        format!("{}:{}", self.current_macro, self.current_micro)
    }

    pub fn flag_truthy(&self, key: &str) -> bool {
        self.flags.get(key).is_some_and(FlagValue::truthy)
    }

    pub fn set_flag(&mut self, key: &str, value: impl Into<FlagValue>) {
        self.flags.insert(key.to_string(), value.into());
    }

    /// Item quantity: structured inventory first, legacy list fallback.
    pub fn item_count(&self, item_id: &str) -> u32 {
        let count = self.inventory.count(item_id);
        if count > 0 {
            return count;
        }
        self.legacy_inventory
            .iter()
            .filter(|i| i.as_str() == item_id)
            .count() as u32
    }

    /// Append a journal entry, evicting the oldest past the cap.
    pub fn push_journal(&mut self, entry: JournalEntry) {
        self.journal_history.push(entry);
        if self.journal_history.len() > JOURNAL_HISTORY_CAP {
            let excess = self.journal_history.len() - JOURNAL_HISTORY_CAP;
            self.journal_history.drain(..excess);
        }
    }

    /// True while a combat session is active (not ended).
    pub fn in_combat(&self) -> bool {
        self.combat.as_ref().is_some_and(|s| !s.ended())
    }
}
