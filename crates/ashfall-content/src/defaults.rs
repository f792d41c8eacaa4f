//! Defaulting rules applied while loading combat content.
//!
//! Raw JSON may omit most weapon/mob attributes; the rules here fill
//! them in: weapon class inferred from tags, per-class generated
//! movesets, ranged/throwable extras, mob combat baselines.

use std::collections::BTreeMap;

use serde::Deserialize;

use ashfall_core::enums::{AiState, DamageType, MoveType, WeaponClass};
use ashfall_core::state::FlagValue;

use crate::defs::{
    BehavioralTraits, LootEntry, MobDef, MovesetEntry, NegotiationOutcome, StatusEffectSpec,
    WeaponDef,
};

/// Weapon definition as it appears on disk; everything optional except id.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWeaponDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub weapon_class: Option<WeaponClass>,
    #[serde(default)]
    pub damage: Option<f64>,
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    #[serde(default)]
    pub reach: Option<i32>,
    #[serde(default)]
    pub noise_level: Option<i32>,
    #[serde(default)]
    pub movesets: Option<BTreeMap<MoveType, MovesetEntry>>,
    #[serde(default)]
    pub status_effects: Vec<StatusEffectSpec>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub clip_size: Option<i32>,
    #[serde(default)]
    pub ammo_in_clip: Option<i32>,
    #[serde(default)]
    pub ammo_reserve: Option<i32>,
    #[serde(default)]
    pub reload_time: Option<i64>,
    #[serde(default)]
    pub uses: Option<i32>,
    #[serde(default)]
    pub aoe_factor: Option<f64>,
    #[serde(default)]
    pub cleave_targets: Option<i32>,
    #[serde(default)]
    pub cleave_factor: Option<f64>,
}

fn melee_movesets() -> BTreeMap<MoveType, MovesetEntry> {
    let mut m = BTreeMap::new();
    m.insert(
        MoveType::Light,
        MovesetEntry {
            stamina_cost: 10,
            windup: 1,
            recovery: 1,
            damage_multiplier: 0.8,
            status_effects: Vec::new(),
        },
    );
    m.insert(
        MoveType::Heavy,
        MovesetEntry {
            stamina_cost: 25,
            windup: 2,
            recovery: 2,
            damage_multiplier: 1.4,
            status_effects: Vec::new(),
        },
    );
    m.insert(
        MoveType::Thrust,
        MovesetEntry {
            stamina_cost: 15,
            windup: 1,
            recovery: 1,
            damage_multiplier: 1.1,
            status_effects: Vec::new(),
        },
    );
    m
}

fn ranged_movesets() -> BTreeMap<MoveType, MovesetEntry> {
    let mut m = BTreeMap::new();
    m.insert(
        MoveType::Aimed,
        MovesetEntry {
            stamina_cost: 8,
            windup: 1,
            recovery: 1,
            damage_multiplier: 1.0,
            status_effects: Vec::new(),
        },
    );
    m.insert(
        MoveType::Snap,
        MovesetEntry {
            stamina_cost: 6,
            windup: 0,
            recovery: 1,
            damage_multiplier: 0.8,
            status_effects: Vec::new(),
        },
    );
    m
}

fn throwable_movesets() -> BTreeMap<MoveType, MovesetEntry> {
    let mut m = BTreeMap::new();
    m.insert(
        MoveType::Throw,
        MovesetEntry {
            stamina_cost: 5,
            windup: 1,
            recovery: 0,
            damage_multiplier: 1.0,
            status_effects: Vec::new(),
        },
    );
    m
}

/// Infer the weapon class from tags when the file omits it.
fn infer_class(tags: &[String]) -> WeaponClass {
    let has = |t: &str| tags.iter().any(|x| x == t);
    if has("ranged") {
        WeaponClass::Ranged
    } else if has("throwable") {
        WeaponClass::Throwable
    } else if has("heavy") {
        WeaponClass::Heavy
    } else {
        WeaponClass::Melee
    }
}

/// Normalize a raw weapon into a fully-defaulted definition.
pub fn normalize_weapon(raw: RawWeaponDef) -> WeaponDef {
    let weapon_class = raw.weapon_class.unwrap_or_else(|| infer_class(&raw.tags));
    let blade = raw.tags.iter().any(|t| t == "blade");
    let damage_type = raw.damage_type.unwrap_or(match weapon_class {
        WeaponClass::Ranged => DamageType::Pierce,
        _ if blade => DamageType::Slash,
        _ => DamageType::Blunt,
    });
    let (reach, noise_level) = match weapon_class {
        WeaponClass::Ranged => (raw.reach.unwrap_or(5), raw.noise_level.unwrap_or(3)),
        WeaponClass::Throwable => (raw.reach.unwrap_or(3), raw.noise_level.unwrap_or(2)),
        _ => (raw.reach.unwrap_or(1), raw.noise_level.unwrap_or(1)),
    };
    let movesets = raw.movesets.unwrap_or_else(|| match weapon_class {
        WeaponClass::Ranged => ranged_movesets(),
        WeaponClass::Throwable => throwable_movesets(),
        _ => melee_movesets(),
    });
    let clip_size = raw.clip_size.unwrap_or(if weapon_class == WeaponClass::Ranged {
        1
    } else {
        0
    });
    let name = raw.name.unwrap_or_else(|| raw.id.clone());
    WeaponDef {
        id: raw.id,
        name,
        weapon_class,
        damage: raw.damage.unwrap_or(1.0),
        damage_type,
        reach,
        noise_level,
        movesets,
        status_effects: raw.status_effects,
        tags: raw.tags,
        clip_size,
        ammo_in_clip: raw.ammo_in_clip.unwrap_or(clip_size),
        ammo_reserve: raw.ammo_reserve.unwrap_or(0),
        reload_time: raw.reload_time.unwrap_or(2),
        uses: raw
            .uses
            .unwrap_or(if weapon_class == WeaponClass::Throwable {
                1
            } else {
                0
            }),
        aoe_factor: raw
            .aoe_factor
            .unwrap_or(if weapon_class == WeaponClass::Throwable {
                0.6
            } else {
                0.0
            }),
        cleave_targets: raw.cleave_targets.unwrap_or(0),
        cleave_factor: raw.cleave_factor.unwrap_or(0.6),
    }
}

/// Mob definition as it appears on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMobDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub hp: i32,
    #[serde(default = "default_attack")]
    pub attack: i32,
    #[serde(default)]
    pub max_stamina: Option<i32>,
    #[serde(default)]
    pub max_posture: Option<f64>,
    #[serde(default)]
    pub stagger_threshold: Option<f64>,
    #[serde(default)]
    pub weapon_handling: Option<f64>,
    #[serde(default)]
    pub resistances: BTreeMap<DamageType, f64>,
    #[serde(default)]
    pub ai_state: Option<AiState>,
    #[serde(default)]
    pub ai_traits: BTreeMap<String, FlagValue>,
    #[serde(default)]
    pub behavioral_traits: Option<BehavioralTraits>,
    #[serde(default)]
    pub loot_table: Vec<LootEntry>,
    #[serde(default)]
    pub negotiation_outcomes: Vec<NegotiationOutcome>,
    #[serde(default)]
    pub attack_interval_minutes: Option<i64>,
    #[serde(default)]
    pub attack_damage_multiplier: Option<f64>,
    #[serde(default)]
    pub attack_interval_multiplier: Option<f64>,
    #[serde(default)]
    pub defensive_qte_window: Option<i64>,
    #[serde(default)]
    pub qte_chance: Option<f64>,
}

fn default_attack() -> i32 {
    1
}

/// Normalize a raw mob into a fully-defaulted definition.
pub fn normalize_mob(raw: RawMobDef) -> MobDef {
    let name = raw.name.unwrap_or_else(|| raw.id.clone());
    MobDef {
        id: raw.id,
        name,
        hp: raw.hp,
        attack: raw.attack,
        max_stamina: raw.max_stamina.unwrap_or(80),
        max_posture: raw.max_posture.unwrap_or(60.0),
        stagger_threshold: raw.stagger_threshold.unwrap_or(0.3),
        weapon_handling: raw.weapon_handling.unwrap_or(0.4),
        resistances: raw.resistances,
        ai_state: raw.ai_state.unwrap_or(AiState::Aggressive),
        ai_traits: raw.ai_traits,
        behavioral_traits: raw.behavioral_traits.unwrap_or_default(),
        loot_table: raw.loot_table,
        negotiation_outcomes: raw.negotiation_outcomes,
        attack_interval_minutes: raw
            .attack_interval_minutes
            .unwrap_or(ashfall_core::constants::DEFAULT_ATTACK_INTERVAL_MINUTES),
        attack_damage_multiplier: raw.attack_damage_multiplier.unwrap_or(1.0),
        attack_interval_multiplier: raw.attack_interval_multiplier.unwrap_or(1.0),
        defensive_qte_window: raw.defensive_qte_window,
        qte_chance: raw.qte_chance.unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_weapon(json: serde_json::Value) -> RawWeaponDef {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn class_inferred_from_tags() {
        let w = normalize_weapon(raw_weapon(serde_json::json!({
            "id": "bow", "damage": 2, "tags": ["ranged"]
        })));
        assert_eq!(w.weapon_class, WeaponClass::Ranged);
        assert_eq!(w.damage_type, DamageType::Pierce);
        assert_eq!(w.reach, 5);
        assert!(w.movesets.contains_key(&MoveType::Aimed));
        assert!(w.movesets.contains_key(&MoveType::Snap));
        assert_eq!(w.ammo_in_clip, w.clip_size);
    }

    #[test]
    fn blade_tag_selects_slash() {
        let w = normalize_weapon(raw_weapon(serde_json::json!({
            "id": "machete", "damage": 4, "tags": ["blade"]
        })));
        assert_eq!(w.weapon_class, WeaponClass::Melee);
        assert_eq!(w.damage_type, DamageType::Slash);
        assert_eq!(w.movesets.len(), 3);
        assert!((w.movesets[&MoveType::Heavy].damage_multiplier - 1.4).abs() < 1e-9);
    }

    #[test]
    fn plain_weapon_defaults_to_blunt_melee() {
        let w = normalize_weapon(raw_weapon(serde_json::json!({"id": "pipe"})));
        assert_eq!(w.weapon_class, WeaponClass::Melee);
        assert_eq!(w.damage_type, DamageType::Blunt);
        assert_eq!(w.reach, 1);
        assert_eq!(w.noise_level, 1);
    }

    #[test]
    fn throwable_defaults() {
        let w = normalize_weapon(raw_weapon(serde_json::json!({
            "id": "molotov", "damage": 3, "tags": ["throwable"]
        })));
        assert_eq!(w.uses, 1);
        assert!((w.aoe_factor - 0.6).abs() < 1e-9);
        assert!(w.movesets.contains_key(&MoveType::Throw));
    }

    #[test]
    fn mob_defaults() {
        let raw: RawMobDef =
            serde_json::from_value(serde_json::json!({"id": "walker", "hp": 6, "attack": 2}))
                .unwrap();
        let m = normalize_mob(raw);
        assert_eq!(m.max_stamina, 80);
        assert!((m.max_posture - 60.0).abs() < 1e-9);
        assert!((m.stagger_threshold - 0.3).abs() < 1e-9);
        assert!((m.weapon_handling - 0.4).abs() < 1e-9);
        assert_eq!(m.ai_state, AiState::Aggressive);
        assert_eq!(m.attack_interval_minutes, 3);
    }
}
