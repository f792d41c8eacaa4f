//! Combat session lifecycle: engage, spawn, end detection, loot hook.

use rand::Rng;

use ashfall_core::action::ActionResult;
use ashfall_core::config::EngineConfig;
use ashfall_core::enums::{CombatOutcome, CombatPhase};
use ashfall_core::errors::ActionError;
use ashfall_core::events::CombatEventName;
use ashfall_core::state::{Combatant, CombatSession, EnemyEntry, GameState};
use ashfall_content::defs::{LootEntry, MobDef};
use ashfall_content::ContentRegistry;

use crate::emit::emit;

/// Build the per-entity combat record for a mob definition.
pub fn combatant_from_mob(mob: &MobDef) -> Combatant {
    Combatant {
        stamina: mob.max_stamina,
        max_stamina: mob.max_stamina,
        posture: mob.max_posture,
        max_posture: mob.max_posture,
        stagger_threshold: mob.stagger_threshold,
        weapon_handling: mob.weapon_handling,
        resistances: mob.resistances.clone(),
        effects: Vec::new(),
        ai_state: mob.ai_state,
        ai_traits: mob.ai_traits.clone(),
    }
}

/// Build an enemy entry, applying difficulty multipliers and an initial
/// jitter in `[0, interval)` so packs attack out of phase.
pub fn create_enemy_entry<R: Rng>(
    now_total: i64,
    mob: &MobDef,
    existing_ids: &[String],
    rng: &mut R,
) -> EnemyEntry {
    let base_interval = mob.attack_interval_minutes.max(1);
    let interval = ((base_interval as f64 * mob.attack_interval_multiplier) as i64).max(1);
    let jitter = if interval > 1 {
        rng.gen_range(0..interval)
    } else {
        0
    };
    let mut id = mob.id.clone();
    let mut name = mob.name.clone();
    if existing_ids.iter().any(|e| *e == id) {
        let mut suffix = 2;
        while existing_ids.iter().any(|e| *e == format!("{}_{suffix}", mob.id)) {
            suffix += 1;
        }
        id = format!("{}_{suffix}", mob.id);
        name = format!("{} ({suffix})", mob.name);
    }
    EnemyEntry {
        id,
        base_id: mob.id.clone(),
        name,
        hp: mob.hp,
        max_hp: mob.hp,
        attack: (mob.attack as f64 * mob.attack_damage_multiplier).floor() as i32,
        attack_interval: interval,
        next_attack_total: now_total + interval + jitter,
        incoming: None,
    }
}

/// Start a combat session against one enemy.
///
/// Fails with `ConflictState` while another session is active.
pub fn start_combat(
    state: &mut GameState,
    mob: &MobDef,
    config: &EngineConfig,
    now_real: f64,
) -> Result<ActionResult, ActionError> {
    if state.in_combat() {
        return Err(ActionError::conflict("Sei già in combattimento."));
    }
    let now_total = state.total_minutes();
    // The primary enemy starts without jitter so the first window is
    // predictable.
    let interval = ((mob.attack_interval_minutes.max(1) as f64 * mob.attack_interval_multiplier)
        as i64)
        .max(1);
    let entry = EnemyEntry {
        id: mob.id.clone(),
        base_id: mob.id.clone(),
        name: mob.name.clone(),
        hp: mob.hp,
        max_hp: mob.hp,
        attack: (mob.attack as f64 * mob.attack_damage_multiplier).floor() as i32,
        attack_interval: interval,
        next_attack_total: now_total + interval,
        incoming: None,
    };

    let mut session = CombatSession {
        enemies: Vec::new(),
        combatants: Default::default(),
        focus_enemy: None,
        phase: CombatPhase::Player,
        qte: None,
        result: None,
        qte_chance: mob.qte_chance,
        defensive_qte_window: mob
            .defensive_qte_window
            .unwrap_or(config.defensive_qte_window_minutes),
        offensive_qte_window: config.offensive_qte_window_minutes,
        distance: 0,
        push_decay: 0,
        attack_all_ready_total: None,
        last_player_action_real: now_real,
        inactivity_attack_seconds: config.inactivity_attack_seconds,
        start_total: now_total,
        loot_processed: Default::default(),
    };
    session
        .combatants
        .insert("player".to_string(), Combatant::player());
    session
        .combatants
        .insert(entry.id.clone(), combatant_from_mob(mob));
    session.enemies.push(entry);

    let lines = vec![
        format!("Un {} ti si avvicina minaccioso.", mob.name),
        format!(
            "HP Nemico: {}/{} | I tuoi HP: {}/{}",
            mob.hp, mob.hp, state.player_hp, state.player_max_hp
        ),
    ];
    state.combat = Some(session);
    emit(
        state,
        CombatEventName::CombatStarted,
        now_real,
        serde_json::json!({"player_id": "player", "enemy_id": mob.id, "enemy_name": mob.name}),
    );
    Ok(ActionResult::from_lines(lines)
        .with_change("combat", serde_json::Value::String("started".into())))
}

/// Add enemies to an existing session, suffixing ids on collision.
pub fn spawn_enemies<R: Rng>(
    state: &mut GameState,
    mob: &MobDef,
    count: u32,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    if !state.in_combat() {
        return Err(ActionError::precondition("Non sei in combattimento."));
    }
    let now_total = state.total_minutes();
    let mut added = Vec::new();
    for _ in 0..count.max(1) {
        let session = state.combat.as_mut().expect("session checked above");
        let existing: Vec<String> = session.enemies.iter().map(|e| e.id.clone()).collect();
        let entry = create_enemy_entry(now_total, mob, &existing, rng);
        session
            .combatants
            .insert(entry.id.clone(), combatant_from_mob(mob));
        added.push(entry.name.clone());
        let id = entry.id.clone();
        session.enemies.push(entry);
        emit(
            state,
            CombatEventName::EnemySpawned,
            now_real,
            serde_json::json!({"enemy_id": id, "base_id": mob.id}),
        );
    }
    Ok(
        ActionResult::line(format!("Arrivano nuovi nemici: {}", added.join(", "))).with_change(
            "spawned",
            serde_json::Value::Number(added.len().into()),
        ),
    )
}

/// Re-point focus at the next living enemy when the focused one dies.
pub fn auto_switch_focus(state: &mut GameState, now_real: f64) {
    let Some(session) = state.combat.as_mut() else {
        return;
    };
    let Some(focus_id) = session.focus_enemy.clone() else {
        return;
    };
    let focused_dead = session
        .enemies
        .iter()
        .find(|e| e.id == focus_id)
        .is_some_and(|e| !e.alive());
    if !focused_dead {
        return;
    }
    let next = session
        .enemies
        .iter()
        .enumerate()
        .find(|(_, e)| e.alive())
        .map(|(i, e)| (i, e.id.clone()));
    match next {
        Some((index, id)) => {
            session.focus_enemy = Some(id.clone());
            emit(
                state,
                CombatEventName::FocusAutoSwitch,
                now_real,
                serde_json::json!({"enemy_id": id, "enemy_index": index}),
            );
        }
        None => session.focus_enemy = None,
    }
}

/// Roll a loot table. `chance_multiplier` scales each entry's chance,
/// clamped to `[0, 1]`.
pub fn roll_loot<R: Rng>(
    table: &[LootEntry],
    chance_multiplier: f64,
    captured: bool,
    rng: &mut R,
) -> Vec<(String, u32)> {
    let mut drops = Vec::new();
    for entry in table {
        let chance = (entry.chance * chance_multiplier).clamp(0.0, 1.0);
        if rng.gen::<f64>() < chance {
            let quantity = if captured {
                entry.captured_bonus.unwrap_or(entry.quantity)
            } else {
                entry.quantity
            };
            drops.push((entry.item.clone(), quantity));
        }
    }
    drops
}

/// Push rolled drops into the player's inventory, buffering a pickup
/// message and emitting `loot_dropped`.
pub fn award_loot(
    state: &mut GameState,
    registry: &ContentRegistry,
    drops: &[(String, u32)],
    source_name: &str,
    now_real: f64,
) {
    let mut picked = Vec::new();
    for (item_id, quantity) in drops {
        if registry.item(item_id).is_none() {
            log::warn!("loot references unknown item '{item_id}'");
            continue;
        }
        let rules = registry.stack_rules(item_id);
        if state.inventory.add(item_id, *quantity, rules).is_err() {
            state
                .pending_messages
                .push(format!("Troppo peso: lasci {} a terra.", registry.object_name(item_id)));
            continue;
        }
        let name = registry.object_name(item_id).to_string();
        picked.push(if *quantity > 1 {
            format!("{name} x{quantity}")
        } else {
            name
        });
    }
    if picked.is_empty() {
        return;
    }
    state
        .pending_messages
        .push(format!("Raccogli da {source_name}: {}", picked.join(", ")));
    emit(
        state,
        CombatEventName::LootDropped,
        now_real,
        serde_json::json!({"source": source_name, "items": picked}),
    );
}

/// Loot every newly dead enemy exactly once.
fn process_defeated_loot<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    now_real: f64,
    rng: &mut R,
) {
    let Some(session) = state.combat.as_ref() else {
        return;
    };
    let newly_dead: Vec<(String, String, String)> = session
        .enemies
        .iter()
        .filter(|e| !e.alive() && !session.loot_processed.contains(&e.id))
        .map(|e| (e.id.clone(), e.base_id.clone(), e.name.clone()))
        .collect();
    for (id, base_id, name) in newly_dead {
        if let Some(session) = state.combat.as_mut() {
            session.loot_processed.insert(id);
        }
        let Some(mob) = registry.mob(&base_id) else {
            continue;
        };
        if mob.loot_table.is_empty() {
            continue;
        }
        let drops = roll_loot(&mob.loot_table, 1.0, false, rng);
        if !drops.is_empty() {
            award_loot(state, registry, &drops, &name, now_real);
        }
    }
}

/// Check end conditions and record the terminal result.
///
/// Exactly one `combat_ended` event is emitted per session; the loot
/// hook runs first so drops from the killing blow land.
pub fn check_end<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    now_real: f64,
    rng: &mut R,
) {
    if state.combat.is_none() {
        return;
    }
    process_defeated_loot(state, registry, now_real, rng);

    let session = state.combat.as_mut().expect("session present");
    if session.phase == CombatPhase::Ended {
        return;
    }
    let all_dead = session.enemies.iter().all(|e| !e.alive());
    if all_dead {
        session.phase = CombatPhase::Ended;
        session.result = Some(CombatOutcome::Victory);
        emit(
            state,
            CombatEventName::CombatEnded,
            now_real,
            serde_json::json!({"result": "victory", "player_id": "player"}),
        );
    } else if state.player_hp <= 0 {
        state.player_hp = 0;
        session.phase = CombatPhase::Ended;
        session.result = Some(CombatOutcome::Defeat);
        emit(
            state,
            CombatEventName::CombatEnded,
            now_real,
            serde_json::json!({"result": "defeat", "player_id": "player"}),
        );
    }
}

/// Record a successful escape as the session's terminal result.
pub fn end_escaped(state: &mut GameState, now_real: f64) {
    let Some(session) = state.combat.as_mut() else {
        return;
    };
    session.phase = CombatPhase::Ended;
    session.result = Some(CombatOutcome::Escaped);
    emit(
        state,
        CombatEventName::CombatEnded,
        now_real,
        serde_json::json!({"result": "escaped", "player_id": "player"}),
    );
}
