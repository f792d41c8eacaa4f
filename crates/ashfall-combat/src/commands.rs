//! Player combat commands.
//!
//! Commands are parsed into a closed enum, then dispatched. Each
//! dispatch ends with a realtime processing pass so enemy pressure
//! advances even between player turns.

use rand::Rng;

use ashfall_core::action::ActionResult;
use ashfall_core::config::EngineConfig;
use ashfall_core::constants::ATTACK_ALL_EXTRA_STAMINA_PER_TARGET;
use ashfall_core::enums::{CombatPhase, HitQuality, MoveType, QteEffect, QteKind, StatusEffect, WeaponClass};
use ashfall_core::errors::ActionError;
use ashfall_core::events::CombatEventName;
use ashfall_core::state::{GameState, WeaponRuntime};
use ashfall_content::defs::WeaponDef;
use ashfall_content::ContentRegistry;

use crate::emit::emit;
use crate::models::{MoveSpec, SituationalModifiers};
use crate::moves;
use crate::passive;
use crate::realtime;
use crate::resolver;
use crate::session;

/// All player commands legal during combat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatCommand {
    Attack {
        target: Option<usize>,
        mode: Option<MoveType>,
    },
    AttackAll,
    Throw { target: Option<usize> },
    Reload,
    Push,
    Flee,
    Focus { target: Option<usize> },
    Status,
    Qte { input: String },
    Hunt { target: Option<usize> },
    Capture { target: Option<usize> },
    Negotiate { target: Option<usize> },
}

impl CombatCommand {
    /// Parse `command` plus optional `arg` into a command. Indices are
    /// 1-based on the wire, 0-based in the enum.
    pub fn parse(command: &str, arg: Option<&str>) -> Result<Self, ActionError> {
        let joined = match arg {
            Some(a) => format!("{command} {a}"),
            None => command.to_string(),
        };
        let mut tokens = joined.split_whitespace();
        let head = tokens
            .next()
            .ok_or_else(|| ActionError::invalid("Comando vuoto."))?
            .to_ascii_lowercase();
        let rest: Vec<String> = tokens.map(|t| t.to_ascii_lowercase()).collect();

        let parse_index = |token: &str| -> Option<usize> {
            token.parse::<usize>().ok().filter(|i| *i >= 1).map(|i| i - 1)
        };

        match head.as_str() {
            "attack" => {
                if rest.first().map(String::as_str) == Some("all") {
                    return Ok(Self::AttackAll);
                }
                let mut target = None;
                let mut mode = None;
                for token in &rest {
                    if let Some(index) = parse_index(token) {
                        target = Some(index);
                    } else {
                        mode = match token.as_str() {
                            "aimed" => Some(MoveType::Aimed),
                            "snap" => Some(MoveType::Snap),
                            _ => {
                                return Err(ActionError::invalid(format!(
                                    "Modalità sconosciuta: {token}"
                                )))
                            }
                        };
                    }
                }
                Ok(Self::Attack { target, mode })
            }
            "throw" => Ok(Self::Throw {
                target: rest.first().and_then(|t| parse_index(t)),
            }),
            "reload" => Ok(Self::Reload),
            "push" => Ok(Self::Push),
            "flee" => Ok(Self::Flee),
            "focus" => Ok(Self::Focus {
                target: rest.first().and_then(|t| parse_index(t)),
            }),
            "status" => Ok(Self::Status),
            "qte" => {
                let input = rest.join("");
                if input.is_empty() {
                    return Err(ActionError::invalid("Inserisci input QTE."));
                }
                Ok(Self::Qte { input })
            }
            "hunt" => Ok(Self::Hunt {
                target: rest.first().and_then(|t| parse_index(t)),
            }),
            "capture" => Ok(Self::Capture {
                target: rest.first().and_then(|t| parse_index(t)),
            }),
            "negotiate" => Ok(Self::Negotiate {
                target: rest.first().and_then(|t| parse_index(t)),
            }),
            other => Err(ActionError::invalid(format!(
                "Azione sconosciuta in combattimento: {other}"
            ))),
        }
    }
}

/// Resolve the acting target: explicit index, else focus, else first
/// living enemy.
pub(crate) fn resolve_target_index(
    state: &GameState,
    explicit: Option<usize>,
) -> Result<usize, ActionError> {
    let session = state.combat.as_ref().expect("in combat");
    if let Some(index) = explicit {
        if let Some(enemy) = session.enemies.get(index) {
            if enemy.alive() {
                return Ok(index);
            }
        }
    }
    if let Some(focus_id) = &session.focus_enemy {
        if let Some(index) = session
            .enemies
            .iter()
            .position(|e| &e.id == focus_id && e.alive())
        {
            return Ok(index);
        }
    }
    session
        .enemies
        .iter()
        .position(|e| e.alive())
        .ok_or_else(|| ActionError::precondition("Nessun bersaglio disponibile."))
}

fn weapon_of<'a>(state: &GameState, registry: &'a ContentRegistry) -> Option<&'a WeaponDef> {
    state
        .player_weapon_id
        .as_deref()
        .and_then(|id| registry.weapon(id))
}

/// Runtime clip/uses record for a weapon, created on first touch.
pub fn ensure_weapon_state(state: &mut GameState, weapon: &WeaponDef) -> WeaponRuntime {
    state
        .weapon_states
        .entry(weapon.id.clone())
        .or_insert_with(|| WeaponRuntime {
            ammo_in_clip: weapon.ammo_in_clip,
            ammo_reserve: weapon.ammo_reserve,
            uses: weapon.uses,
        })
        .clone()
}

fn environment_modifiers(state: &GameState) -> SituationalModifiers {
    SituationalModifiers {
        flanking: false,
        cover: false,
        darkness: state.clock.daytime == ashfall_core::enums::Daytime::Night,
        rain: state.clock.weather.is_rainy(),
    }
}

fn quality_text(quality: HitQuality) -> &'static str {
    match quality {
        HitQuality::Graze => "di striscio ",
        HitQuality::Normal => "",
        HitQuality::Critical => "critico ",
    }
}

fn ammo_suffix(state: &GameState, weapon: Option<&WeaponDef>) -> String {
    let Some(w) = weapon.filter(|w| w.is_ranged()) else {
        return String::new();
    };
    match state.weapon_states.get(&w.id) {
        Some(rt) => format!(
            " | Munizioni: {}/{} (riserva {})",
            rt.ammo_in_clip, w.clip_size, rt.ammo_reserve
        ),
        None => String::new(),
    }
}

/// Record resolver telemetry into the timeline.
fn record_events(
    state: &mut GameState,
    events: Vec<(CombatEventName, serde_json::Value)>,
    now_real: f64,
) {
    for (name, payload) in events {
        emit(state, name, now_real, payload);
    }
}

/// During a defensive window, non-QTE aggression takes the incoming hit
/// as a penalty and then proceeds; a stale offensive QTE is cancelled.
fn override_qte_phase<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    now_real: f64,
    rng: &mut R,
    lines: &mut Vec<String>,
) -> Result<(), ActionError> {
    let Some(session) = state.combat.as_mut() else {
        return Err(ActionError::precondition("Non sei in combattimento."));
    };
    if session.phase != CombatPhase::Qte {
        return Ok(());
    }
    let kind = session.qte.as_ref().map(|q| q.kind);
    match kind {
        Some(QteKind::Defense) => {
            let attacker_index = session.qte.as_ref().and_then(|q| q.attacker_index);
            let damage = attacker_index
                .and_then(|i| session.enemies.get_mut(i))
                .and_then(|e| e.incoming.take())
                .map(|i| i.damage)
                .unwrap_or(0);
            session.qte = None;
            state.player_hp -= damage;
            lines.push(format!(
                "Ignori la difesa e vieni colpito per {damage} danni! (HP: {}/{})",
                state.player_hp.max(0),
                state.player_max_hp
            ));
            session::check_end(state, registry, now_real, rng);
            if let Some(session) = state.combat.as_mut() {
                if session.phase != CombatPhase::Ended {
                    session.phase = CombatPhase::Player;
                }
            }
        }
        Some(QteKind::Offense) => {
            session.qte = None;
            session.phase = CombatPhase::Player;
        }
        None => {}
    }
    let session = state.combat.as_ref().expect("session survives override");
    if session.phase != CombatPhase::Player {
        return Err(ActionError::precondition("Non è il tuo turno."));
    }
    Ok(())
}

fn require_player_phase(state: &GameState) -> Result<(), ActionError> {
    let session = state
        .combat
        .as_ref()
        .ok_or_else(|| ActionError::precondition("Non sei in combattimento."))?;
    if session.phase != CombatPhase::Player {
        return Err(ActionError::precondition("Non è il tuo turno."));
    }
    Ok(())
}

fn mark_player_action(state: &mut GameState, now_real: f64) {
    if let Some(session) = state.combat.as_mut() {
        session.last_player_action_real = now_real;
    }
}

/// Resolve a combat command against the active session.
pub fn resolve_combat_action<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    command: &str,
    arg: Option<&str>,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    if state.combat.is_none() {
        return Err(ActionError::precondition("Non sei in combattimento."));
    }

    // An expired offensive QTE resolves before anything else.
    let mut expired_lines = realtime::expire_offense_qte_if_due(state, now_real);
    if !expired_lines.is_empty() {
        expired_lines.extend(realtime::process_realtime_events(
            state, registry, config, now_real, rng,
        ));
        return Ok(ActionResult::from_lines(expired_lines));
    }

    if state.combat.as_ref().is_some_and(|s| s.ended()) {
        return Ok(ActionResult::line("Il combattimento è già concluso."));
    }

    match CombatCommand::parse(command, arg)? {
        CombatCommand::Attack { target, mode } => {
            attack_single(state, registry, config, target, mode, now_real, rng)
        }
        CombatCommand::AttackAll => attack_all(state, registry, config, now_real, rng),
        CombatCommand::Throw { target } => throw(state, registry, config, target, now_real, rng),
        CombatCommand::Reload => reload(state, registry, config, now_real, rng),
        CombatCommand::Push => push(state, registry, config, now_real, rng),
        CombatCommand::Flee => flee(state, registry, config, now_real, rng),
        CombatCommand::Focus { target } => focus(state, target, now_real),
        CombatCommand::Status => status(state, registry, config, now_real, rng),
        CombatCommand::Qte { input } => submit_qte(state, registry, config, &input, now_real, rng),
        CombatCommand::Hunt { target } => {
            passive::interact(state, registry, passive::PassiveAction::Hunt, target, now_real, rng)
        }
        CombatCommand::Capture { target } => passive::interact(
            state,
            registry,
            passive::PassiveAction::Capture,
            target,
            now_real,
            rng,
        ),
        CombatCommand::Negotiate { target } => passive::interact(
            state,
            registry,
            passive::PassiveAction::Negotiate,
            target,
            now_real,
            rng,
        ),
    }
}

fn select_move(
    weapon: Option<&WeaponDef>,
    mode: Option<MoveType>,
) -> Result<MoveSpec, ActionError> {
    if let (Some(w), Some(mode)) = (weapon, mode) {
        if !w.is_ranged() {
            return Err(ActionError::precondition(
                "Solo le armi da fuoco supportano aimed/snap.",
            ));
        }
        return Ok(moves::move_from_weapon(w, mode));
    }
    moves::available_moves(weapon)
        .into_iter()
        .next()
        .ok_or_else(|| ActionError::precondition("Nessuna mossa disponibile."))
}

fn attack_single<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    target: Option<usize>,
    mode: Option<MoveType>,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    let mut lines = Vec::new();
    override_qte_phase(state, registry, now_real, rng, &mut lines)?;
    if state.combat.as_ref().is_some_and(|s| s.ended()) {
        return Ok(ActionResult::from_lines(lines));
    }
    mark_player_action(state, now_real);

    let target_index = resolve_target_index(state, target)?;
    let weapon = weapon_of(state, registry).cloned();
    let move_spec = select_move(weapon.as_ref(), mode)?;

    // Ranged weapons consume a round up front.
    if let Some(w) = weapon.as_ref().filter(|w| w.is_ranged()) {
        let runtime = ensure_weapon_state(state, w);
        if runtime.ammo_in_clip <= 0 {
            return Err(ActionError::precondition(
                "Nessun colpo nel caricatore. Usa 'reload'.",
            ));
        }
        state
            .weapon_states
            .get_mut(&w.id)
            .expect("runtime just ensured")
            .ammo_in_clip -= 1;
    }

    {
        let session = state.combat.as_ref().expect("in combat");
        let player = &session.combatants["player"];
        if player.stamina < move_spec.stamina_cost {
            return Err(ActionError::precondition(format!(
                "Non hai abbastanza stamina per {}.",
                move_spec.name
            )));
        }
    }

    let modifiers = environment_modifiers(state);
    let (enemy_id, enemy_name) = {
        let session = state.combat.as_ref().expect("in combat");
        let enemy = &session.enemies[target_index];
        (enemy.id.clone(), enemy.name.clone())
    };

    let mut result = {
        let session = state.combat.as_mut().expect("in combat");
        resolver::resolve_attack(
            &mut session.combatants,
            "player",
            &enemy_id,
            &move_spec,
            &modifiers,
            rng,
        )
    };
    record_events(state, std::mem::take(&mut result.events), now_real);

    if !result.success {
        lines.extend(result.description);
        lines.extend(realtime::process_realtime_events(
            state, registry, config, now_real, rng,
        ));
        return Ok(ActionResult::from_lines(lines));
    }

    let damage = result.damage_int();
    let (hp, max_hp) = {
        let session = state.combat.as_mut().expect("in combat");
        let enemy = &mut session.enemies[target_index];
        enemy.hp = (enemy.hp - damage).max(0);
        (enemy.hp, enemy.max_hp)
    };
    let suffix = ammo_suffix(state, weapon.as_ref());
    lines.push(format!(
        "Colpisci {}il {} infliggendo {} danni. ({}/{}){}",
        quality_text(result.hit_quality),
        enemy_name,
        damage,
        hp,
        max_hp,
        suffix
    ));

    // Heavy cleave onto additional targets.
    if let Some(w) = weapon
        .as_ref()
        .filter(|w| w.weapon_class == WeaponClass::Heavy && w.cleave_targets > 0)
    {
        let cleave_lines = cleave(
            state,
            &move_spec,
            target_index,
            w.cleave_targets as usize,
            w.cleave_factor,
            now_real,
            rng,
        );
        lines.extend(cleave_lines);
    }

    if result
        .status_effects_applied
        .iter()
        .any(|e| e.effect == StatusEffect::Staggered)
    {
        lines.push("Il nemico barcolla!".to_string());
    }

    session::check_end(state, registry, now_real, rng);
    session::auto_switch_focus(state, now_real);
    emit(
        state,
        CombatEventName::PlayerAttack,
        now_real,
        serde_json::json!({
            "enemy_id": enemy_id,
            "enemy_index": target_index,
            "damage": damage,
            "hit_quality": result.hit_quality,
            "enemy_hp": hp,
        }),
    );
    if state.combat.as_ref().is_some_and(|s| s.ended()) {
        lines.push("Hai vinto.".to_string());
        return Ok(ActionResult::from_lines(lines)
            .with_change("combat", serde_json::Value::String("victory".into())));
    }

    // Post-attack tick on the struck enemy: DoT lands now.
    lines.extend(tick_enemy(state, registry, target_index, now_real, rng));
    if state.combat.as_ref().is_some_and(|s| s.ended()) {
        lines.push("Hai vinto.".to_string());
        return Ok(ActionResult::from_lines(lines)
            .with_change("combat", serde_json::Value::String("victory".into())));
    }

    realtime::maybe_trigger_offense_qte(state, config, rng);
    if let Some(session) = state.combat.as_ref() {
        if session.phase == CombatPhase::Qte {
            if let Some(qte) = &session.qte {
                if qte.kind == QteKind::Offense {
                    lines.push(qte.prompt.clone());
                    return Ok(ActionResult::from_lines(lines));
                }
            }
        }
    }
    lines.extend(realtime::process_realtime_events(
        state, registry, config, now_real, rng,
    ));
    Ok(ActionResult::from_lines(lines))
}

/// Resolve cleave hits on up to `max_targets` other living enemies at
/// `factor` of resolved damage.
#[allow(clippy::too_many_arguments)]
fn cleave<R: Rng>(
    state: &mut GameState,
    move_spec: &MoveSpec,
    primary_index: usize,
    max_targets: usize,
    factor: f64,
    now_real: f64,
    rng: &mut R,
) -> Vec<String> {
    let modifiers = environment_modifiers(state);
    let other_indices: Vec<usize> = {
        let session = state.combat.as_ref().expect("in combat");
        session
            .enemies
            .iter()
            .enumerate()
            .filter(|(i, e)| *i != primary_index && e.alive())
            .map(|(i, _)| i)
            .take(max_targets)
            .collect()
    };
    let mut reports = Vec::new();
    let mut struck = Vec::new();
    for index in other_indices {
        let enemy_id = state.combat.as_ref().expect("in combat").enemies[index]
            .id
            .clone();
        let result = {
            let session = state.combat.as_mut().expect("in combat");
            resolver::resolve_attack(
                &mut session.combatants,
                "player",
                &enemy_id,
                move_spec,
                &modifiers,
                rng,
            )
        };
        if !result.success {
            continue;
        }
        let cleave_damage = ((result.total_damage() * factor).round() as i32).max(0);
        if cleave_damage == 0 {
            continue;
        }
        let session = state.combat.as_mut().expect("in combat");
        let enemy = &mut session.enemies[index];
        enemy.hp = (enemy.hp - cleave_damage).max(0);
        reports.push(format!(
            "{} -{} ({}/{})",
            enemy.name, cleave_damage, enemy.hp, enemy.max_hp
        ));
        struck.push(serde_json::json!({
            "enemy_id": enemy.id,
            "enemy_index": index,
            "enemy_hp": enemy.hp,
        }));
    }
    if reports.is_empty() {
        return Vec::new();
    }
    emit(
        state,
        CombatEventName::HeavyCleave,
        now_real,
        serde_json::json!({"targets": struck}),
    );
    vec![format!(
        "Colpo pesante fende altri nemici: {}",
        reports.join("; ")
    )]
}

/// Tick effect/regeneration systems on one enemy, applying DoT to HP.
fn tick_enemy<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    index: usize,
    now_real: f64,
    rng: &mut R,
) -> Vec<String> {
    let (enemy_id, tick_damage) = {
        let session = state.combat.as_mut().expect("in combat");
        let Some(enemy) = session.enemies.get(index) else {
            return Vec::new();
        };
        let id = enemy.id.clone();
        let damage = resolver::tick_systems(&mut session.combatants, &id);
        (id, damage)
    };
    if tick_damage.is_empty() {
        return Vec::new();
    }
    let total: f64 = tick_damage.iter().map(|d| d.amount).sum();
    let tick_int = (total.round() as i32).max(0);
    let mut lines = Vec::new();
    if tick_int > 0 {
        lines.push(format!("Effetti stato causano {tick_int} danni aggiuntivi."));
    }
    let hp = {
        let session = state.combat.as_mut().expect("in combat");
        let enemy = &mut session.enemies[index];
        enemy.hp = (enemy.hp - tick_int).max(0);
        enemy.hp
    };
    emit(
        state,
        CombatEventName::StatusTick,
        now_real,
        serde_json::json!({
            "enemy_id": enemy_id,
            "enemy_index": index,
            "tick_damage": total,
            "enemy_hp": hp,
        }),
    );
    session::check_end(state, registry, now_real, rng);
    session::auto_switch_focus(state, now_real);
    lines
}

fn attack_all<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    let mut lines = Vec::new();
    override_qte_phase(state, registry, now_real, rng, &mut lines)?;
    if state.combat.as_ref().is_some_and(|s| s.ended()) {
        return Ok(ActionResult::from_lines(lines));
    }

    let now_total = state.total_minutes();
    {
        let session = state.combat.as_ref().expect("in combat");
        if let Some(ready_total) = session.attack_all_ready_total {
            if now_total < ready_total {
                lines.push(format!(
                    "L'attacco ad area non è pronto (restano {}m).",
                    ready_total - now_total
                ));
                return Ok(ActionResult::from_lines(lines));
            }
        }
    }
    mark_player_action(state, now_real);

    let alive_indices: Vec<usize> = {
        let session = state.combat.as_ref().expect("in combat");
        session
            .enemies
            .iter()
            .enumerate()
            .filter(|(_, e)| e.alive())
            .map(|(i, _)| i)
            .collect()
    };
    if alive_indices.is_empty() {
        return Err(ActionError::precondition("Nessun bersaglio disponibile."));
    }

    let weapon = weapon_of(state, registry).cloned();
    let base_move = select_move(weapon.as_ref(), None)?;
    let n = alive_indices.len();
    let total_cost =
        base_move.stamina_cost + ATTACK_ALL_EXTRA_STAMINA_PER_TARGET * (n as i32 - 1);

    // One stamina transaction covers the whole sweep.
    {
        let session = state.combat.as_mut().expect("in combat");
        let player = session.combatants.get_mut("player").expect("player");
        if !crate::stamina::consume(player, total_cost) {
            return Err(ActionError::precondition(
                "Non hai abbastanza stamina per un attacco ad area.",
            ));
        }
    }
    let mut sweep_move = base_move.clone();
    sweep_move.stamina_cost = 0;
    sweep_move.name = format!("{} (AoE)", base_move.name);

    let scaling = 0.5 * (0.8 + 0.2 * (n as f64 / (n as f64 + 2.0)));
    let modifiers = environment_modifiers(state);
    let mut reports = Vec::new();
    let mut per_target = Vec::new();
    for index in alive_indices {
        let enemy_id = state.combat.as_ref().expect("in combat").enemies[index]
            .id
            .clone();
        let result = {
            let session = state.combat.as_mut().expect("in combat");
            resolver::resolve_attack(
                &mut session.combatants,
                "player",
                &enemy_id,
                &sweep_move,
                &modifiers,
                rng,
            )
        };
        if !result.success {
            continue;
        }
        let scaled = ((result.total_damage() * scaling).round() as i32).max(0);
        let session = state.combat.as_mut().expect("in combat");
        let enemy = &mut session.enemies[index];
        enemy.hp = (enemy.hp - scaled).max(0);
        reports.push(format!(
            "{} -{} ({}/{})",
            enemy.name, scaled, enemy.hp, enemy.max_hp
        ));
        per_target.push(serde_json::json!({
            "enemy_id": enemy.id,
            "enemy_index": index,
            "damage": scaled,
            "enemy_hp": enemy.hp,
        }));
    }
    if !reports.is_empty() {
        lines.push(format!("Colpisci tutti i nemici! {}", reports.join("; ")));
    } else {
        lines.push("L'attacco ad area non va a segno.".to_string());
    }
    emit(
        state,
        CombatEventName::AreaAttack,
        now_real,
        serde_json::json!({"targets": per_target}),
    );

    // Cooldown: the mean live attack interval, floored by config.
    {
        let session = state.combat.as_mut().expect("in combat");
        let live: Vec<i64> = session
            .enemies
            .iter()
            .filter(|e| e.alive())
            .map(|e| e.attack_interval)
            .collect();
        let avg = if live.is_empty() {
            config.min_attack_all_cooldown_minutes
        } else {
            live.iter().sum::<i64>() / live.len() as i64
        };
        session.attack_all_ready_total =
            Some(now_total + avg.max(config.min_attack_all_cooldown_minutes));
    }

    session::check_end(state, registry, now_real, rng);
    session::auto_switch_focus(state, now_real);
    if state.combat.as_ref().is_some_and(|s| s.ended()) {
        lines.push("Hai vinto.".to_string());
        return Ok(ActionResult::from_lines(lines)
            .with_change("combat", serde_json::Value::String("victory".into())));
    }
    lines.extend(realtime::process_realtime_events(
        state, registry, config, now_real, rng,
    ));
    Ok(ActionResult::from_lines(lines))
}

fn throw<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    target: Option<usize>,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    require_player_phase(state)?;
    mark_player_action(state, now_real);

    let weapon = weapon_of(state, registry)
        .cloned()
        .ok_or_else(|| ActionError::precondition("Nessuna arma equipaggiata."))?;
    if !weapon.is_throwable() {
        return Err(ActionError::precondition("Questa non è un'arma da lancio."));
    }
    let runtime = ensure_weapon_state(state, &weapon);
    if runtime.uses <= 0 {
        return Err(ActionError::precondition("Non ti rimangono usi."));
    }

    let target_index = resolve_target_index(state, target)?;
    let move_spec = moves::move_from_weapon(&weapon, MoveType::Throw);
    let modifiers = environment_modifiers(state);
    let enemy_id = state.combat.as_ref().expect("in combat").enemies[target_index]
        .id
        .clone();

    let result = {
        let session = state.combat.as_mut().expect("in combat");
        resolver::resolve_attack(
            &mut session.combatants,
            "player",
            &enemy_id,
            &move_spec,
            &modifiers,
            rng,
        )
    };
    // One use burns whether or not the throw lands.
    state
        .weapon_states
        .get_mut(&weapon.id)
        .expect("runtime ensured")
        .uses -= 1;
    let uses_left = state.weapon_states[&weapon.id].uses;

    let mut lines = Vec::new();
    if !result.success {
        lines.push("Lancio mancato.".to_string());
        lines.extend(realtime::process_realtime_events(
            state, registry, config, now_real, rng,
        ));
        return Ok(ActionResult::from_lines(lines));
    }

    let damage = result.damage_int();
    let (name, hp, max_hp) = {
        let session = state.combat.as_mut().expect("in combat");
        let enemy = &mut session.enemies[target_index];
        enemy.hp = (enemy.hp - damage).max(0);
        (enemy.name.clone(), enemy.hp, enemy.max_hp)
    };
    let mut line = format!("Colpisci {name} per {damage} danni. ({hp}/{max_hp}).");

    // Splash onto every other live enemy.
    let mut splash_reports = Vec::new();
    if weapon.aoe_factor > 0.0 {
        let other_indices: Vec<usize> = {
            let session = state.combat.as_ref().expect("in combat");
            session
                .enemies
                .iter()
                .enumerate()
                .filter(|(i, e)| *i != target_index && e.alive())
                .map(|(i, _)| i)
                .collect()
        };
        let mut struck = Vec::new();
        for index in other_indices {
            let other_id = state.combat.as_ref().expect("in combat").enemies[index]
                .id
                .clone();
            let splash_result = {
                let session = state.combat.as_mut().expect("in combat");
                resolver::resolve_attack(
                    &mut session.combatants,
                    "player",
                    &other_id,
                    &move_spec,
                    &modifiers,
                    rng,
                )
            };
            if !splash_result.success {
                continue;
            }
            let splash = ((splash_result.total_damage() * weapon.aoe_factor).round() as i32).max(0);
            if splash == 0 {
                continue;
            }
            let session = state.combat.as_mut().expect("in combat");
            let other = &mut session.enemies[index];
            other.hp = (other.hp - splash).max(0);
            splash_reports.push(format!("{} -{} ({}/{})", other.name, splash, other.hp, other.max_hp));
            struck.push(serde_json::json!({
                "enemy_id": other.id,
                "enemy_index": index,
                "enemy_hp": other.hp,
            }));
        }
        if !splash_reports.is_empty() {
            line.push_str(&format!(" Spruzzi colpiscono: {}", splash_reports.join("; ")));
            emit(
                state,
                CombatEventName::ThrowSplash,
                now_real,
                serde_json::json!({"targets": struck}),
            );
        }
    }
    line.push_str(&format!(" | Usi rimasti: {uses_left}"));
    lines.push(line);
    emit(
        state,
        CombatEventName::Throw,
        now_real,
        serde_json::json!({"primary": enemy_id, "uses_left": uses_left}),
    );

    session::check_end(state, registry, now_real, rng);
    session::auto_switch_focus(state, now_real);
    if state.combat.as_ref().is_some_and(|s| s.ended()) {
        lines.push("Hai vinto.".to_string());
        return Ok(ActionResult::from_lines(lines)
            .with_change("combat", serde_json::Value::String("victory".into())));
    }
    lines.extend(tick_enemy(state, registry, target_index, now_real, rng));
    if state.combat.as_ref().is_some_and(|s| s.ended()) {
        lines.push("Hai vinto.".to_string());
        return Ok(ActionResult::from_lines(lines)
            .with_change("combat", serde_json::Value::String("victory".into())));
    }
    lines.extend(realtime::process_realtime_events(
        state, registry, config, now_real, rng,
    ));
    Ok(ActionResult::from_lines(lines))
}

fn reload<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    require_player_phase(state)?;
    mark_player_action(state, now_real);

    let weapon = weapon_of(state, registry)
        .cloned()
        .ok_or_else(|| ActionError::precondition("Nessuna arma equipaggiata."))?;
    if !weapon.is_ranged() {
        return Err(ActionError::precondition(
            "Non stai impugnando un'arma da fuoco.",
        ));
    }
    if weapon.clip_size <= 0 {
        return Err(ActionError::precondition("Questa arma non supporta ricarica."));
    }
    let runtime = ensure_weapon_state(state, &weapon);
    let mut lines = Vec::new();
    if runtime.ammo_in_clip >= weapon.clip_size {
        lines.push("Il caricatore è già pieno.".to_string());
    } else if runtime.ammo_reserve <= 0 {
        lines.push("Nessuna munizione di riserva.".to_string());
    } else {
        let needed = weapon.clip_size - runtime.ammo_in_clip;
        let to_load = needed.min(runtime.ammo_reserve);
        let rt = state.weapon_states.get_mut(&weapon.id).expect("ensured");
        rt.ammo_in_clip += to_load;
        rt.ammo_reserve -= to_load;
        lines.push(format!(
            "Ricarichi {} colpi ({}/{} | riserva {}).",
            to_load, rt.ammo_in_clip, weapon.clip_size, rt.ammo_reserve
        ));
        // Reloading costs time: the most imminent attacker gets delayed.
        let now_total = state.total_minutes();
        let delay = weapon.reload_time.max(1);
        let session = state.combat.as_mut().expect("in combat");
        if let Some(enemy) = session
            .enemies
            .iter_mut()
            .filter(|e| e.alive() && e.incoming.is_none())
            .min_by_key(|e| e.next_attack_total)
        {
            enemy.next_attack_total = enemy.next_attack_total.max(now_total) + delay;
        }
    }
    lines.extend(realtime::process_realtime_events(
        state, registry, config, now_real, rng,
    ));
    Ok(ActionResult::from_lines(lines))
}

fn push<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    require_player_phase(state)?;
    mark_player_action(state, now_real);
    let now_total = state.total_minutes();
    let mut lines = Vec::new();
    {
        let session = state.combat.as_mut().expect("in combat");
        let Some(enemy) = session.enemies.iter_mut().find(|e| e.alive()) else {
            return Err(ActionError::precondition("Nessun bersaglio disponibile."));
        };
        let name = enemy.name.clone();
        session.distance += 1;
        session.push_decay = 1;
        lines.push(format!(
            "Spingi {name} e guadagni spazio (distanza {}).",
            session.distance
        ));
        // The enemy spends its next window closing back in.
        session.distance -= 1;
        lines.push(format!("Il {name} avanza per ridurre la distanza."));
        if let Some(enemy) = session
            .enemies
            .iter_mut()
            .filter(|e| e.alive() && e.incoming.is_none())
            .min_by_key(|e| e.next_attack_total)
        {
            enemy.next_attack_total = enemy.next_attack_total.max(now_total + 1);
        }
    }
    lines.extend(realtime::process_realtime_events(
        state, registry, config, now_real, rng,
    ));
    Ok(ActionResult::from_lines(lines))
}

fn flee<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    require_player_phase(state)?;
    mark_player_action(state, now_real);
    let now_total = state.total_minutes();
    let chance = {
        let session = state.combat.as_ref().expect("in combat");
        let mut chance = 0.30;
        if session.distance > 0 {
            chance += 0.30;
        }
        if session
            .enemies
            .iter()
            .any(|e| e.alive() && (e.hp as f64) < e.max_hp as f64 * 0.4)
        {
            chance += 0.20;
        }
        chance
    };
    if rng.gen::<f64>() < chance {
        let mut lines = vec!["Riesci a sganciarti e fuggire.".to_string()];
        emit(
            state,
            CombatEventName::PlayerEscape,
            now_real,
            serde_json::json!({}),
        );
        session::end_escaped(state, now_real);
        Ok(ActionResult::from_lines(lines)
            .with_change("combat", serde_json::Value::String("escaped".into())))
    } else {
        let mut lines = vec!["Tentativo di fuga fallito!".to_string()];
        // Immediate pressure: the next attacker strikes now.
        let session = state.combat.as_mut().expect("in combat");
        if let Some(enemy) = session
            .enemies
            .iter_mut()
            .filter(|e| e.alive() && e.incoming.is_none())
            .min_by_key(|e| e.next_attack_total)
        {
            enemy.next_attack_total = now_total;
        }
        emit(
            state,
            CombatEventName::PlayerEscapeFail,
            now_real,
            serde_json::json!({}),
        );
        lines.extend(realtime::process_realtime_events(
            state, registry, config, now_real, rng,
        ));
        Ok(ActionResult::from_lines(lines))
    }
}

fn focus(
    state: &mut GameState,
    target: Option<usize>,
    now_real: f64,
) -> Result<ActionResult, ActionError> {
    require_player_phase(state)?;
    let index = resolve_target_index(state, target)?;
    let (id, name) = {
        let session = state.combat.as_mut().expect("in combat");
        let enemy = &session.enemies[index];
        let pair = (enemy.id.clone(), enemy.name.clone());
        session.focus_enemy = Some(pair.0.clone());
        pair
    };
    emit(
        state,
        CombatEventName::FocusSet,
        now_real,
        serde_json::json!({"enemy_id": id, "enemy_index": index}),
    );
    Ok(ActionResult::line(format!("Ti concentri su {name}.")))
}

fn status<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    let mut lines = realtime::process_realtime_events(state, registry, config, now_real, rng);
    let now_total = state.total_minutes();
    let weapon = weapon_of(state, registry).cloned();
    let session = state.combat.as_ref().expect("in combat");

    let mut status_line = format!(
        "Tu {}/{} | Fase: {:?}",
        state.player_hp, state.player_max_hp, session.phase
    );
    let player = &session.combatants["player"];
    status_line.push_str(&format!(
        " | Stamina: {}/{} | Postura: {:.0}/{:.0}",
        player.stamina, player.max_stamina, player.posture, player.max_posture
    ));
    if let Some(primary) = session.primary() {
        if let Some(c) = session.combatants.get(&primary.id) {
            status_line.push_str(&format!(
                " | Nemico Stamina: {}/{} | Nemico Postura: {:.0}/{:.0}",
                c.stamina, c.max_stamina, c.posture, c.max_posture
            ));
        }
    }
    if let Some(qte) = &session.qte {
        let remaining = (qte.deadline_total - now_total).max(0);
        status_line.push_str(&format!(
            " | QTE: {} (restano {remaining} minuti)",
            qte.prompt
        ));
    }
    if let Some(w) = weapon.as_ref() {
        if w.is_ranged() {
            status_line.push_str(&ammo_suffix(state, Some(w)));
        } else if w.is_throwable() {
            let uses = state
                .weapon_states
                .get(&w.id)
                .map(|rt| rt.uses)
                .unwrap_or(w.uses);
            status_line.push_str(&format!(" | Usi: {uses}"));
        }
    }
    lines.push(status_line);

    for (index, enemy) in session.enemies.iter().enumerate() {
        let mut flags = Vec::new();
        if !enemy.alive() {
            flags.push("X".to_string());
        }
        if session.focus_enemy.as_deref() == Some(&enemy.id) && enemy.alive() {
            flags.push("F".to_string());
        }
        if let Some(incoming) = &enemy.incoming {
            let remaining = (incoming.deadline_total - now_total).max(0);
            flags.push(format!("I:{remaining}m"));
        }
        let flag_str = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(","))
        };
        lines.push(format!(
            "  {}. {} {}/{}{}",
            index + 1,
            enemy.name,
            enemy.hp,
            enemy.max_hp,
            flag_str
        ));
    }
    Ok(ActionResult::from_lines(lines))
}

fn submit_qte<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    config: &EngineConfig,
    input: &str,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    let now_total = state.total_minutes();
    {
        let session = state.combat.as_ref().expect("in combat");
        if session.phase != CombatPhase::Qte || session.qte.is_none() {
            return Err(ActionError::precondition("Nessun QTE attivo."));
        }
    }
    mark_player_action(state, now_real);

    let qte = state
        .combat
        .as_ref()
        .expect("in combat")
        .qte
        .clone()
        .expect("qte checked above");
    let correct = input.eq_ignore_ascii_case(&qte.expected);
    let mut lines = Vec::new();

    match (qte.kind, correct) {
        (QteKind::Offense, true) => {
            match qte.effect {
                Some(QteEffect::BonusDamage) => {
                    let weapon = weapon_of(state, registry);
                    let bonus = weapon.map(|w| w.damage as i32).unwrap_or(1).max(1);
                    let session = state.combat.as_mut().expect("in combat");
                    if let Some(enemy) = session.enemies.iter_mut().find(|e| e.alive()) {
                        enemy.hp = (enemy.hp - bonus).max(0);
                        lines.push(format!(
                            "Colpo mirato! Bonus {bonus} danni. ({}/{})",
                            enemy.hp, enemy.max_hp
                        ));
                    }
                    emit(
                        state,
                        CombatEventName::QteOffenseSuccess,
                        now_real,
                        serde_json::json!({"effect": "bonus_damage", "bonus": bonus}),
                    );
                    session::check_end(state, registry, now_real, rng);
                }
                Some(QteEffect::ReduceNextDamage) => {
                    let session = state.combat.as_mut().expect("in combat");
                    if let Some(enemy) = session.enemies.iter_mut().find(|e| e.alive()) {
                        enemy.attack = (enemy.attack - 1).max(0);
                    }
                    lines.push("Riduci il danno del prossimo attacco.".to_string());
                    emit(
                        state,
                        CombatEventName::QteOffenseSuccess,
                        now_real,
                        serde_json::json!({"effect": "reduce_next_damage"}),
                    );
                }
                _ => {
                    lines.push("Reazione riuscita!".to_string());
                    emit(
                        state,
                        CombatEventName::QteOffenseSuccess,
                        now_real,
                        serde_json::json!({"effect": "generic"}),
                    );
                }
            }
            if let Some(session) = state.combat.as_mut() {
                if session.phase != CombatPhase::Ended {
                    session.phase = CombatPhase::Player;
                }
                session.qte = None;
            }
            if state.combat.as_ref().is_some_and(|s| s.ended()) {
                lines.push("Hai vinto.".to_string());
                return Ok(ActionResult::from_lines(lines)
                    .with_change("combat", serde_json::Value::String("victory".into())));
            }
            Ok(ActionResult::from_lines(lines))
        }
        (QteKind::Offense, false) => {
            lines.push("Fallisci la reazione!".to_string());
            {
                let session = state.combat.as_mut().expect("in combat");
                session.qte = None;
                session.phase = CombatPhase::Player;
            }
            realtime::tighten_next_attack(state, now_total + 1);
            emit(
                state,
                CombatEventName::QteOffenseFail,
                now_real,
                serde_json::json!({"reason": "wrong_input"}),
            );
            lines.extend(realtime::process_realtime_events(
                state, registry, config, now_real, rng,
            ));
            Ok(ActionResult::from_lines(lines))
        }
        (QteKind::Defense, true) => {
            lines.push("Parata riuscita! Annulli l'attacco imminente.".to_string());
            {
                let session = state.combat.as_mut().expect("in combat");
                if let Some(index) = qte.attacker_index {
                    if let Some(enemy) = session.enemies.get_mut(index) {
                        enemy.incoming = None;
                        enemy.next_attack_total = now_total + enemy.attack_interval.max(1);
                    }
                }
                session.qte = None;
                session.phase = CombatPhase::Player;
            }
            emit(
                state,
                CombatEventName::QteDefenseSuccess,
                now_real,
                serde_json::json!({"attacker_index": qte.attacker_index}),
            );
            Ok(ActionResult::from_lines(lines))
        }
        (QteKind::Defense, false) => {
            lines.push("Fallisci la difesa!".to_string());
            let damage = {
                let session = state.combat.as_mut().expect("in combat");
                let damage = qte
                    .attacker_index
                    .and_then(|i| session.enemies.get_mut(i))
                    .and_then(|e| {
                        let damage = e.incoming.take().map(|i| i.damage);
                        if damage.is_some() {
                            e.next_attack_total = now_total + e.attack_interval.max(1);
                        }
                        damage
                    })
                    .unwrap_or(0);
                session.qte = None;
                damage
            };
            state.player_hp -= damage;
            lines.push(format!(
                "Un nemico ti colpisce infliggendo {damage} danni! (HP: {}/{})",
                state.player_hp.max(0),
                state.player_max_hp
            ));
            emit(
                state,
                CombatEventName::QteDefenseFail,
                now_real,
                serde_json::json!({"reason": "wrong_input", "damage": damage}),
            );
            session::check_end(state, registry, now_real, rng);
            if let Some(session) = state.combat.as_mut() {
                if session.phase != CombatPhase::Ended {
                    session.phase = CombatPhase::Player;
                }
            }
            Ok(ActionResult::from_lines(lines))
        }
    }
}
