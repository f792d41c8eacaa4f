//! Tactical AI: per-state move selection, target priority, retreat
//! heuristics, and behavioral state transitions.
//!
//! Pure functions over the combatant pool — no session dependency, so
//! the policies are testable in isolation.

use std::collections::BTreeMap;

use rand::Rng;

use ashfall_core::enums::{AiState, MoveType, StatusEffect};
use ashfall_core::state::Combatant;

use crate::effects;
use crate::models::MoveSpec;
use crate::stamina;

/// Snapshot of the tactical situation an entity evaluates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Situation {
    /// Entities fighting alongside the evaluated one (itself included).
    pub allied_count: usize,
    /// Opposing entities.
    pub enemy_count: usize,
    /// Threats close enough to matter for fleeing entities.
    pub nearby_threats: usize,
    pub being_attacked: bool,
}

fn highest_damage<'a>(moves: &[&'a MoveSpec]) -> Option<&'a MoveSpec> {
    moves
        .iter()
        .copied()
        .max_by(|a, b| a.damage_base.total_cmp(&b.damage_base))
}

fn cheapest<'a>(moves: &[&'a MoveSpec]) -> Option<&'a MoveSpec> {
    moves.iter().copied().min_by_key(|m| m.stamina_cost)
}

fn pick<'a, R: Rng>(moves: &[&'a MoveSpec], rng: &mut R) -> Option<&'a MoveSpec> {
    if moves.is_empty() {
        return None;
    }
    Some(moves[rng.gen_range(0..moves.len())])
}

/// Choose the move for an entity, by behavioral state. Returns a clone
/// so the caller can mutate the pool afterwards.
pub fn choose_move<R: Rng>(
    pool: &mut BTreeMap<String, Combatant>,
    entity_id: &str,
    moves: &[MoveSpec],
    targets: &[String],
    situation: &Situation,
    rng: &mut R,
) -> Option<MoveSpec> {
    if moves.is_empty() {
        return None;
    }
    let me = pool.get(entity_id)?;
    let viable: Vec<&MoveSpec> = moves
        .iter()
        .filter(|m| stamina::has_stamina_for(me, m))
        .collect();
    if viable.is_empty() {
        // Out of breath: commit to the cheapest move anyway, the
        // resolver's stamina gate will report the failure.
        return moves.iter().min_by_key(|m| m.stamina_cost).cloned();
    }

    let state = me.ai_state;
    let chosen = match state {
        AiState::Aggressive => choose_aggressive(me, &viable, rng),
        AiState::Cautious => choose_cautious(pool, entity_id, &viable, targets, rng),
        AiState::Pack => choose_pack(pool, entity_id, &viable, targets, situation, rng),
        AiState::Passive => return choose_passive(pool, entity_id, &viable, targets, situation, rng),
        AiState::Surrendered => choose_surrendered(me, &viable),
        AiState::Fleeing => return choose_fleeing(pool, entity_id, &viable, targets, rng),
    };
    chosen.or_else(|| pick(&viable, rng)).cloned()
}

fn choose_aggressive<'a, R: Rng>(
    me: &Combatant,
    viable: &[&'a MoveSpec],
    rng: &mut R,
) -> Option<&'a MoveSpec> {
    let heavy = moves_of_types_ref(viable, &[MoveType::Heavy, MoveType::Thrust]);
    if !heavy.is_empty() && me.stamina > 50 {
        return highest_damage(&heavy);
    }
    let damaging: Vec<&MoveSpec> = viable.iter().copied().filter(|m| m.damage_base > 0.0).collect();
    if !damaging.is_empty() {
        return highest_damage(&damaging);
    }
    pick(viable, rng)
}

fn moves_of_types_ref<'a>(moves: &[&'a MoveSpec], types: &[MoveType]) -> Vec<&'a MoveSpec> {
    moves
        .iter()
        .copied()
        .filter(|m| types.contains(&m.move_type))
        .collect()
}

fn choose_cautious<'a, R: Rng>(
    pool: &BTreeMap<String, Combatant>,
    entity_id: &str,
    viable: &[&'a MoveSpec],
    targets: &[String],
    rng: &mut R,
) -> Option<&'a MoveSpec> {
    let me = &pool[entity_id];
    // Low on resources: prefer cheap defensive moves.
    if me.posture_ratio() < 0.4 || me.stamina_ratio() < 0.3 {
        let defensive = moves_of_types_ref(viable, &[MoveType::Parry, MoveType::Light]);
        if !defensive.is_empty() {
            return cheapest(&defensive);
        }
    }
    // Opportunistic heavy on a broken target.
    if let Some(target) = targets.first().and_then(|t| pool.get(t)) {
        if target.posture_ratio() < 0.3 {
            let heavy = moves_of_types_ref(viable, &[MoveType::Heavy, MoveType::Thrust]);
            if !heavy.is_empty() {
                return highest_damage(&heavy);
            }
        }
    }
    let balanced = moves_of_types_ref(viable, &[MoveType::Light, MoveType::Thrust]);
    if !balanced.is_empty() {
        return pick(&balanced, rng);
    }
    pick(viable, rng)
}

fn choose_pack<'a, R: Rng>(
    pool: &BTreeMap<String, Combatant>,
    entity_id: &str,
    viable: &[&'a MoveSpec],
    targets: &[String],
    situation: &Situation,
    rng: &mut R,
) -> Option<&'a MoveSpec> {
    let me = &pool[entity_id];
    if situation.allied_count > 1 && !targets.is_empty() {
        let heavy = moves_of_types_ref(viable, &[MoveType::Heavy, MoveType::Thrust]);
        if !heavy.is_empty() && me.stamina > 30 {
            return highest_damage(&heavy);
        }
    }
    // Pack hunters soften prey with status moves.
    if me.trait_flag("pack_hunter") {
        let status_moves: Vec<&MoveSpec> = viable
            .iter()
            .copied()
            .filter(|m| !m.status_effects.is_empty())
            .collect();
        if !status_moves.is_empty() && rng.gen::<f64>() < 0.4 {
            return pick(&status_moves, rng);
        }
    }
    choose_aggressive(me, viable, rng)
}

fn choose_passive<R: Rng>(
    pool: &mut BTreeMap<String, Combatant>,
    entity_id: &str,
    viable: &[&MoveSpec],
    targets: &[String],
    situation: &Situation,
    rng: &mut R,
) -> Option<MoveSpec> {
    let me = pool.get(entity_id)?;
    if me.trait_flag("flees_when_hurt") && me.posture_ratio() < 0.7 {
        pool.get_mut(entity_id)?.ai_state = AiState::Fleeing;
        return choose_fleeing(pool, entity_id, viable, targets, rng);
    }
    let defensive = moves_of_types_ref(viable, &[MoveType::Parry, MoveType::Dodge]);
    if !defensive.is_empty() {
        return cheapest(&defensive).cloned();
    }
    // Reluctant defense: the lightest touch available.
    let light = moves_of_types_ref(viable, &[MoveType::Light]);
    if !light.is_empty() {
        return light
            .iter()
            .copied()
            .min_by(|a, b| a.damage_base.total_cmp(&b.damage_base))
            .cloned();
    }
    viable
        .iter()
        .copied()
        .min_by(|a, b| a.damage_base.total_cmp(&b.damage_base))
        .cloned()
}

fn choose_surrendered<'a>(me: &Combatant, viable: &[&'a MoveSpec]) -> Option<&'a MoveSpec> {
    if me.trait_flag("cornered") {
        let desperate = moves_of_types_ref(viable, &[MoveType::Light, MoveType::Thrust]);
        if !desperate.is_empty() {
            return cheapest(&desperate);
        }
    }
    let defensive = moves_of_types_ref(viable, &[MoveType::Parry, MoveType::Dodge]);
    if !defensive.is_empty() {
        return cheapest(&defensive);
    }
    viable
        .iter()
        .copied()
        .min_by(|a, b| a.damage_base.total_cmp(&b.damage_base))
}

fn choose_fleeing<R: Rng>(
    pool: &mut BTreeMap<String, Combatant>,
    entity_id: &str,
    viable: &[&MoveSpec],
    targets: &[String],
    rng: &mut R,
) -> Option<MoveSpec> {
    let me = pool.get(entity_id)?;
    let evasive = moves_of_types_ref(viable, &[MoveType::Dodge, MoveType::Light]);
    if !evasive.is_empty() {
        return evasive.iter().copied().min_by_key(|m| m.recovery_time).cloned();
    }
    // Surrounded: turn and fight cautiously.
    if targets.len() > 2 || me.trait_flag("cornered") {
        pool.get_mut(entity_id)?.ai_state = AiState::Cautious;
        return choose_cautious(pool, entity_id, viable, targets, rng).cloned();
    }
    viable
        .iter()
        .copied()
        .min_by_key(|m| m.stamina_cost + m.recovery_time)
        .cloned()
}

/// Sort targets by descending vulnerability score:
/// `(1 - posture_ratio) * 10 + effect_count * 2 + staggered * 5`.
pub fn target_priority(pool: &BTreeMap<String, Combatant>, targets: &[String]) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> = targets
        .iter()
        .map(|id| {
            let score = pool
                .get(id)
                .map(|c| {
                    let mut s = (1.0 - c.posture_ratio()) * 10.0;
                    s += c.effects.len() as f64 * 2.0;
                    if effects::has_effect(c, StatusEffect::Staggered) {
                        s += 5.0;
                    }
                    s
                })
                .unwrap_or(0.0);
            (score, id)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, id)| id.clone()).collect()
}

/// Whether the entity should try to break off.
pub fn should_retreat(
    pool: &BTreeMap<String, Combatant>,
    entity_id: &str,
    situation: &Situation,
) -> bool {
    let Some(me) = pool.get(entity_id) else {
        return false;
    };
    match me.ai_state {
        AiState::Aggressive => me.posture_ratio() < 0.15,
        AiState::Cautious => {
            me.posture_ratio() < 0.3
                || me.stamina_ratio() < 0.2
                || situation.enemy_count > 2
        }
        AiState::Pack => situation.allied_count <= 1,
        _ => false,
    }
}

/// Situation-driven state changes for regular combatants.
pub fn update_ai_state(
    pool: &mut BTreeMap<String, Combatant>,
    entity_id: &str,
    situation: &Situation,
) {
    let Some(me) = pool.get_mut(entity_id) else {
        return;
    };
    if me.posture_ratio() < 0.3
        && me.ai_state != AiState::Aggressive
        && !me.trait_flag("always_aggressive")
    {
        me.ai_state = AiState::Cautious;
    }
    if me.trait_flag("pack_hunter") {
        if situation.allied_count > 2 {
            me.ai_state = AiState::Pack;
        } else if situation.allied_count == 1 {
            me.ai_state = AiState::Cautious;
        }
    }
}

/// State transitions specific to passive / fleeing / surrendered mobs.
pub fn check_passive_state_changes(
    pool: &mut BTreeMap<String, Combatant>,
    entity_id: &str,
    situation: &Situation,
) {
    let Some(me) = pool.get_mut(entity_id) else {
        return;
    };
    match me.ai_state {
        AiState::Passive => {
            if me.trait_flag("flees_when_hurt") && me.posture_ratio() < 0.5 {
                me.ai_state = AiState::Fleeing;
            }
        }
        AiState::Fleeing => {
            if me.posture_ratio() > 0.8 && situation.nearby_threats == 0 {
                me.ai_state = AiState::Passive;
            }
        }
        AiState::Surrendered => {
            if situation.being_attacked && !me.trait_flag("never_desperate") {
                me.set_trait("cornered", true);
            }
        }
        _ => {}
    }
}
