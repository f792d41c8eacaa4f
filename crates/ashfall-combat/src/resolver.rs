//! Single-attack resolution.
//!
//! Pipeline: stamina gate → consume → hit quality → hit roll by grade →
//! damage with resistances → posture damage with stagger check → move
//! status effects → telemetry events.

use std::collections::BTreeMap;

use rand::Rng;

use ashfall_core::constants::*;
use ashfall_core::enums::HitQuality;
use ashfall_core::state::{Combatant, StatusEffectInstance};

use crate::effects;
use crate::models::{CombatResult, DamageInstance, MoveSpec, SituationalModifiers};
use crate::posture;
use crate::stamina;

fn quality_damage_multiplier(quality: HitQuality) -> f64 {
    match quality {
        HitQuality::Graze => 0.5,
        HitQuality::Normal => 1.0,
        HitQuality::Critical => 1.8,
    }
}

fn quality_posture_multiplier(quality: HitQuality) -> f64 {
    match quality {
        HitQuality::Graze => 0.3,
        HitQuality::Normal => 1.0,
        HitQuality::Critical => 1.5,
    }
}

fn quality_token(quality: HitQuality) -> &'static str {
    match quality {
        HitQuality::Graze => "graze",
        HitQuality::Normal => "normal",
        HitQuality::Critical => "critical",
    }
}

/// Hit probability by grade.
pub fn hit_chance(quality: HitQuality) -> f64 {
    match quality {
        HitQuality::Graze => 0.4,
        HitQuality::Normal => 0.7,
        HitQuality::Critical => 0.9,
    }
}

/// Score the attack and grade it.
fn calculate_hit_quality(
    attacker: &Combatant,
    defender: &Combatant,
    modifiers: &SituationalModifiers,
) -> HitQuality {
    let mut score = 0.5;
    score += (attacker.weapon_handling - 0.5) * 0.3;
    score += posture::posture_gap(attacker, defender) * 0.2;
    if modifiers.flanking {
        score += 0.15;
    }
    if modifiers.cover {
        score -= 0.10;
    }
    if modifiers.darkness {
        score -= 0.05;
    }
    if modifiers.rain {
        score -= 0.05;
    }
    score *= stamina::penalty(attacker);
    score *= effects::accuracy_penalty(attacker);
    if score >= CRITICAL_SCORE_THRESHOLD {
        HitQuality::Critical
    } else if score <= GRAZE_SCORE_THRESHOLD {
        HitQuality::Graze
    } else {
        HitQuality::Normal
    }
}

/// Resolve one attack between two entities in the pool.
///
/// A failed stamina gate consumes nothing and reports
/// `stamina_insufficient`; a miss consumes stamina only. Never panics on
/// unknown ids: missing entities produce a failed result.
pub fn resolve_attack<R: Rng>(
    pool: &mut BTreeMap<String, Combatant>,
    attacker_id: &str,
    defender_id: &str,
    move_spec: &MoveSpec,
    modifiers: &SituationalModifiers,
    rng: &mut R,
) -> CombatResult {
    let mut result = CombatResult::default();

    let Some(attacker) = pool.get(attacker_id) else {
        result.description.push(format!("Attaccante sconosciuto: {attacker_id}"));
        return result;
    };
    if !stamina::has_stamina_for(attacker, move_spec) {
        result
            .description
            .push(format!("Attaccante senza stamina per {}", move_spec.name));
        result.events.push((
            ashfall_core::events::CombatEventName::StaminaInsufficient,
            serde_json::json!({
                "attacker": attacker_id,
                "move": move_spec.id,
                "stamina_needed": move_spec.stamina_cost,
                "stamina_available": attacker.stamina,
            }),
        ));
        return result;
    }

    let quality = {
        let Some(defender) = pool.get(defender_id) else {
            result.description.push(format!("Bersaglio sconosciuto: {defender_id}"));
            return result;
        };
        calculate_hit_quality(&pool[attacker_id], defender, modifiers)
    };
    result.hit_quality = quality;

    // Commit stamina.
    let attacker = pool.get_mut(attacker_id).expect("attacker exists");
    stamina::consume(attacker, move_spec.stamina_cost);
    result.stamina_consumed = move_spec.stamina_cost;

    if rng.gen::<f64>() > hit_chance(quality) {
        result
            .description
            .push(format!("Attacco mancato - {}", quality_token(quality)));
        result.events.push((
            ashfall_core::events::CombatEventName::AttackMissed,
            serde_json::json!({
                "attacker": attacker_id,
                "defender": defender_id,
                "move": move_spec.id,
                "hit_quality": quality,
            }),
        ));
        return result;
    }
    result.success = true;

    let defender = pool.get_mut(defender_id).expect("defender exists");
    let resistance = defender
        .resistances
        .get(&move_spec.damage_type)
        .copied()
        .unwrap_or(1.0);
    let amount = move_spec.damage_base * quality_damage_multiplier(quality) * resistance;
    if amount > 0.0 {
        result.damage_dealt.push(DamageInstance {
            amount,
            damage_type: move_spec.damage_type,
            source: Some(move_spec.id.clone()),
            hit_quality: quality,
        });
    }

    let posture_damage =
        move_spec.damage_base * POSTURE_DAMAGE_FACTOR * quality_posture_multiplier(quality);
    if posture_damage > 0.0 {
        result.posture_damage = posture_damage;
        if let Some(stagger) = posture::damage_posture(defender, posture_damage) {
            effects::apply_effect(defender, stagger.clone());
            result.status_effects_applied.push(stagger);
        }
    }

    for (effect, duration, intensity) in &move_spec.status_effects {
        let instance = StatusEffectInstance {
            effect: *effect,
            duration: *duration,
            intensity: *intensity,
            source: Some(move_spec.id.clone()),
        };
        effects::apply_effect(defender, instance.clone());
        result.status_effects_applied.push(instance);
    }

    result.events.push((
        ashfall_core::events::CombatEventName::AttackResolved,
        serde_json::json!({
            "attacker": attacker_id,
            "defender": defender_id,
            "move": move_spec.id,
            "hit_quality": quality,
            "damage": amount,
            "damage_type": move_spec.damage_type,
            "posture_damage": posture_damage,
            "stamina_consumed": move_spec.stamina_cost,
        }),
    ));
    result
}

/// Per-tick processing for one entity: effect DoT plus stamina/posture
/// regeneration. Returns damage to apply to the entity's HP.
pub fn tick_systems(pool: &mut BTreeMap<String, Combatant>, entity_id: &str) -> Vec<DamageInstance> {
    let Some(c) = pool.get_mut(entity_id) else {
        return Vec::new();
    };
    let damage = effects::tick_effects(c);
    stamina::tick_regen(c);
    posture::tick_regen(c);
    damage
}
