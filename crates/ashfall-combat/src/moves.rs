//! Move construction from weapon data.

use ashfall_core::enums::{DamageType, MoveType, StatusEffect};
use ashfall_content::defs::{StatusEffectSpec, WeaponDef};

use crate::models::MoveSpec;

/// Effect-name alias table accepted from content files.
pub fn parse_status_effect(name: &str) -> Option<StatusEffect> {
    match name.to_ascii_lowercase().as_str() {
        "bleed" | "bleeding" => Some(StatusEffect::Bleed),
        "burn" | "fire" => Some(StatusEffect::Burn),
        "concussed" | "stun" => Some(StatusEffect::Concussed),
        "staggered" | "stagger" => Some(StatusEffect::Staggered),
        "crippled" | "cripple" => Some(StatusEffect::Crippled),
        _ => None,
    }
}

fn parse_specs(specs: &[StatusEffectSpec]) -> Vec<(StatusEffect, i32, f64)> {
    specs
        .iter()
        .filter_map(|StatusEffectSpec(name, duration, intensity)| {
            parse_status_effect(name).map(|e| (e, *duration, *intensity))
        })
        .collect()
}

/// Build the move a weapon offers for a given move type. Falls back to
/// neutral moveset values when the weapon does not list the type.
pub fn move_from_weapon(weapon: &WeaponDef, move_type: MoveType) -> MoveSpec {
    let default_entry = Default::default();
    let entry = weapon.movesets.get(&move_type).unwrap_or(&default_entry);
    let mut status_effects = parse_specs(&entry.status_effects);
    // Weapon-level effects apply to every move.
    status_effects.extend(parse_specs(&weapon.status_effects));
    MoveSpec {
        id: format!("{}_{:?}", weapon.id, move_type).to_lowercase(),
        name: format!("{} ({:?})", weapon.name, move_type).to_lowercase(),
        move_type,
        stamina_cost: entry.stamina_cost,
        reach: weapon.reach,
        windup_time: entry.windup,
        recovery_time: entry.recovery,
        noise_level: weapon.noise_level,
        damage_base: weapon.damage * entry.damage_multiplier,
        damage_type: weapon.damage_type,
        status_effects,
    }
}

/// Bare-handed fallback when nothing is equipped.
pub fn unarmed_move() -> MoveSpec {
    MoveSpec {
        id: "unarmed_light".to_string(),
        name: "pugno".to_string(),
        move_type: MoveType::Light,
        stamina_cost: 5,
        reach: 1,
        windup_time: 1,
        recovery_time: 1,
        noise_level: 1,
        damage_base: 1.0,
        damage_type: DamageType::Blunt,
        status_effects: Vec::new(),
    }
}

/// All moves the player can currently perform.
pub fn available_moves(weapon: Option<&WeaponDef>) -> Vec<MoveSpec> {
    match weapon {
        Some(w) => w
            .movesets
            .keys()
            .map(|move_type| move_from_weapon(w, *move_type))
            .collect(),
        None => vec![unarmed_move()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashfall_content::defaults::{normalize_weapon, RawWeaponDef};

    fn knife() -> WeaponDef {
        let raw: RawWeaponDef = serde_json::from_value(serde_json::json!({
            "id": "knife", "name": "Coltello", "damage": 3, "tags": ["blade"],
            "movesets": {
                "light": {"stamina_cost": 10, "damage_multiplier": 0.8,
                          "status_effects": [["bleed", 3, 1.0]]},
                "heavy": {"stamina_cost": 25, "damage_multiplier": 1.4}
            }
        }))
        .unwrap();
        normalize_weapon(raw)
    }

    #[test]
    fn move_scales_damage_by_multiplier() {
        let m = move_from_weapon(&knife(), MoveType::Light);
        assert!((m.damage_base - 2.4).abs() < 1e-9);
        assert_eq!(m.damage_type, DamageType::Slash);
        assert_eq!(m.status_effects, vec![(StatusEffect::Bleed, 3, 1.0)]);
    }

    #[test]
    fn effect_aliases_parse() {
        assert_eq!(parse_status_effect("FIRE"), Some(StatusEffect::Burn));
        assert_eq!(parse_status_effect("stagger"), Some(StatusEffect::Staggered));
        assert_eq!(parse_status_effect("frost"), None);
    }

    #[test]
    fn unarmed_when_no_weapon() {
        let moves = available_moves(None);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].id, "unarmed_light");
    }

    #[test]
    fn light_move_listed_first() {
        let moves = available_moves(Some(&knife()));
        assert_eq!(moves[0].move_type, MoveType::Light);
    }
}
