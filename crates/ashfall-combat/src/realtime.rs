//! Realtime event processing: enemy attack windows, QTE scheduling and
//! timeouts, inactivity acceleration.
//!
//! Called on every realtime tick and after every player command. All
//! deadlines are in simulated total-minutes; only the inactivity gate
//! reads the wall clock.

use rand::Rng;

use ashfall_core::config::EngineConfig;
use ashfall_core::enums::{CombatPhase, QteEffect, QteKind};
use ashfall_core::events::CombatEventName;
use ashfall_core::state::{GameState, IncomingAttack, QteState};
use ashfall_content::ContentRegistry;

use crate::ai;
use crate::emit::emit;
use crate::models::MoveSpec;
use crate::session;
use crate::stamina;

/// Generate the expected token for a QTE: a single character normally,
/// a 3–5 alphanumeric code with complex QTEs enabled.
pub fn generate_qte_code<R: Rng>(config: &EngineConfig, rng: &mut R) -> String {
    let alphabet: Vec<char> = config.qte_alphabet.chars().collect();
    let len = if config.complex_qte {
        rng.gen_range(config.qte_code_len_min..=config.qte_code_len_max)
    } else {
        1
    };
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// After a successful player hit, roll for an offensive QTE.
///
/// Never stacks on a pending defensive window.
pub fn maybe_trigger_offense_qte<R: Rng>(
    state: &mut GameState,
    config: &EngineConfig,
    rng: &mut R,
) {
    let now_total = state.total_minutes();
    let Some(session) = state.combat.as_mut() else {
        return;
    };
    if session.phase != CombatPhase::Player || session.qte_chance <= 0.0 {
        return;
    }
    if session
        .qte
        .as_ref()
        .is_some_and(|q| q.kind == QteKind::Defense)
    {
        return;
    }
    if rng.gen::<f64>() >= session.qte_chance {
        return;
    }
    let deadline = now_total + session.offensive_qte_window;
    let (prompt, expected) = if config.complex_qte {
        let code = generate_qte_code(config, rng);
        (format!("QTE Offensivo! Digita: {code}"), code)
    } else {
        let code = generate_qte_code(config, rng);
        (format!("Reazione! Premi {code}!"), code)
    };
    let effect = match rng.gen_range(0..3) {
        0 => QteEffect::BonusDamage,
        1 => QteEffect::ReduceNextDamage,
        _ => QteEffect::Generic,
    };
    session.phase = CombatPhase::Qte;
    session.qte = Some(QteState {
        kind: QteKind::Offense,
        prompt,
        expected,
        deadline_total: deadline,
        effect: Some(effect),
        attacker_index: None,
    });
}

/// Expire an offensive QTE whose deadline has passed. Per the QTE
/// contract, a timeout tightens the next enemy attack to `now + 1`.
pub fn expire_offense_qte_if_due(state: &mut GameState, now_real: f64) -> Vec<String> {
    let now_total = state.total_minutes();
    let Some(session) = state.combat.as_mut() else {
        return Vec::new();
    };
    let expired = session.phase == CombatPhase::Qte
        && session
            .qte
            .as_ref()
            .is_some_and(|q| q.kind == QteKind::Offense && now_total >= q.deadline_total);
    if !expired {
        return Vec::new();
    }
    session.qte = None;
    session.phase = CombatPhase::Player;
    tighten_next_attack(state, now_total + 1);
    emit(
        state,
        CombatEventName::QteOffenseFail,
        now_real,
        serde_json::json!({"reason": "timeout"}),
    );
    vec!["Fallisci il tempo di reazione!".to_string()]
}

/// Pull the earliest live enemy's next attack forward to `target` (never
/// pushes it back).
pub fn tighten_next_attack(state: &mut GameState, target: i64) {
    let Some(session) = state.combat.as_mut() else {
        return;
    };
    if let Some(enemy) = session
        .enemies
        .iter_mut()
        .filter(|e| e.alive() && e.incoming.is_none())
        .min_by_key(|e| e.next_attack_total)
    {
        enemy.next_attack_total = enemy.next_attack_total.min(target);
    }
}

/// Process pending realtime events. Returns narrative lines.
pub fn process_realtime_events<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    now_real: f64,
    rng: &mut R,
) -> Vec<String> {
    if !state.in_combat() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let now_total = state.total_minutes();

    // Inactivity gate: a stalling player gets attacked now.
    {
        let session = state.combat.as_mut().expect("in combat");
        let idle = now_real - session.last_player_action_real;
        let incoming_pending = session.enemies.iter().any(|e| e.incoming.is_some());
        if session.inactivity_attack_seconds > 0.0
            && idle >= session.inactivity_attack_seconds
            && !incoming_pending
        {
            for enemy in session.enemies.iter_mut().filter(|e| e.alive()) {
                enemy.next_attack_total = now_total;
            }
        }
    }

    // Landing: an unanswered defensive window delivers the hit.
    let landed = {
        let session = state.combat.as_mut().expect("in combat");
        let attacker_index = session
            .qte
            .as_ref()
            .filter(|q| q.kind == QteKind::Defense)
            .and_then(|q| q.attacker_index);
        attacker_index.and_then(|index| {
            let enemy = session.enemies.get_mut(index)?;
            let incoming = enemy.incoming.clone()?;
            if now_total < incoming.deadline_total {
                return None;
            }
            enemy.incoming = None;
            let interval = enemy.attack_interval.max(1);
            enemy.next_attack_total = now_total + interval;
            Some((enemy.name.clone(), incoming.damage))
        })
    };
    if let Some((name, damage)) = landed {
        state.player_hp -= damage;
        out.push(format!(
            "{name} ti colpisce infliggendo {damage} danni! (HP: {}/{})",
            state.player_hp.max(0),
            state.player_max_hp
        ));
        let session = state.combat.as_mut().expect("in combat");
        session.qte = None;
        emit(
            state,
            CombatEventName::QteDefenseFail,
            now_real,
            serde_json::json!({"reason": "timeout", "damage": damage}),
        );
        session::check_end(state, registry, now_real, rng);
        if let Some(session) = state.combat.as_mut() {
            if session.phase != CombatPhase::Ended {
                session.phase = CombatPhase::Player;
            }
        }
        return out;
    }

    // Opening: the most imminent due attacker winds up a new window.
    let session = state.combat.as_mut().expect("in combat");
    let defense_pending = session
        .qte
        .as_ref()
        .is_some_and(|q| q.kind == QteKind::Defense);
    let offense_active = session.phase == CombatPhase::Qte
        && session
            .qte
            .as_ref()
            .is_some_and(|q| q.kind == QteKind::Offense);
    if !defense_pending && !offense_active {
        let due = session
            .enemies
            .iter()
            .enumerate()
            .filter(|(_, e)| e.alive() && e.incoming.is_none())
            .min_by_key(|(_, e)| e.next_attack_total)
            .filter(|(_, e)| e.next_attack_total <= now_total)
            .map(|(i, _)| i);
        if let Some(index) = due {
            // Behavioral state gates the strike: passive, surrendered,
            // fleeing, or spent enemies hold back and recover instead.
            if !enemy_commits_to_attack(session, index, rng) {
                let enemy_id = session.enemies[index].id.clone();
                if let Some(c) = session.combatants.get_mut(&enemy_id) {
                    stamina::tick_regen(c);
                }
                let enemy = &mut session.enemies[index];
                enemy.next_attack_total = now_total + enemy.attack_interval.max(1);
                return out;
            }
            let window = session.defensive_qte_window;
            let deadline = now_total + window;
            let name = {
                let enemy = &mut session.enemies[index];
                enemy.incoming = Some(IncomingAttack {
                    damage: enemy.attack,
                    deadline_total: deadline,
                });
                let interval = enemy.attack_interval.max(1);
                enemy.next_attack_total = deadline + interval;
                enemy.name.clone()
            };
            let code = if config.complex_qte {
                generate_qte_code(config, rng)
            } else {
                "d".to_string()
            };
            let prompt = if config.complex_qte {
                format!("Difesa! Digita: {code}")
            } else {
                "Difesa! Premi D!".to_string()
            };
            session.phase = CombatPhase::Qte;
            session.qte = Some(QteState {
                kind: QteKind::Defense,
                prompt: prompt.clone(),
                expected: code,
                deadline_total: deadline,
                effect: None,
                attacker_index: Some(index),
            });
            out.push(format!("{name} prepara un attacco!"));
            out.push(prompt);
        }
    }
    out
}

/// The generic move palette an enemy weighs each attack window.
fn enemy_moves(attack: i32) -> Vec<MoveSpec> {
    use ashfall_core::enums::{DamageType, MoveType};
    let strike = |move_type: MoveType, multiplier: f64, cost: i32| MoveSpec {
        id: format!("enemy_{move_type:?}").to_lowercase(),
        name: format!("enemy_{move_type:?}").to_lowercase(),
        move_type,
        stamina_cost: cost,
        reach: 1,
        windup_time: 1,
        recovery_time: 1,
        noise_level: 1,
        damage_base: attack as f64 * multiplier,
        damage_type: DamageType::Blunt,
        status_effects: Vec::new(),
    };
    vec![
        strike(MoveType::Light, 1.0, 15),
        strike(MoveType::Heavy, 1.4, 25),
        strike(MoveType::Parry, 0.0, 4),
        strike(MoveType::Dodge, 0.0, 3),
    ]
}

/// Let the winding-up enemy's behavioral state decide whether this
/// window is a strike or a defensive posture. Returns false when the
/// enemy holds back (passive, surrendered, fleeing, or spent).
fn enemy_commits_to_attack<R: Rng>(
    session: &mut ashfall_core::state::CombatSession,
    index: usize,
    rng: &mut R,
) -> bool {
    let (enemy_id, attack) = {
        let enemy = &session.enemies[index];
        (enemy.id.clone(), enemy.attack)
    };
    let allied_count = session.enemies.iter().filter(|e| e.alive()).count();
    let situation = ai::Situation {
        allied_count,
        enemy_count: 1,
        nearby_threats: 1,
        being_attacked: false,
    };
    ai::update_ai_state(&mut session.combatants, &enemy_id, &situation);
    ai::check_passive_state_changes(&mut session.combatants, &enemy_id, &situation);
    if ai::should_retreat(&session.combatants, &enemy_id, &situation) {
        return false;
    }
    let moves = enemy_moves(attack);
    let chosen = ai::choose_move(
        &mut session.combatants,
        &enemy_id,
        &moves,
        &["player".to_string()],
        &situation,
        rng,
    );
    let Some(chosen) = chosen else {
        return false;
    };
    if chosen.damage_base <= 0.0 {
        return false;
    }
    // Commit stamina; a spent enemy loses the window.
    match session.combatants.get_mut(&enemy_id) {
        Some(c) => stamina::consume(c, chosen.stamina_cost),
        None => true,
    }
}

/// Public realtime tick: processes pending deadlines without player
/// input. No-op on an ended session.
pub fn tick_combat<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    now_real: f64,
    rng: &mut R,
) -> Vec<String> {
    if !state.in_combat() {
        return Vec::new();
    }
    let mut lines = expire_offense_qte_if_due(state, now_real);
    lines.extend(process_realtime_events(state, registry, config, now_real, rng));
    lines
}
