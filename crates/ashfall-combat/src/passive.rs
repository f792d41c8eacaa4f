//! Passive-mob interactions: hunt, capture, negotiate.
//!
//! Legal only against enemies whose current behavioral state is
//! passive, surrendered, or fleeing; anything else gets a
//! category-specific refusal.

use rand::Rng;

use ashfall_core::action::ActionResult;
use ashfall_core::enums::{AiState, CombatPhase};
use ashfall_core::errors::ActionError;
use ashfall_core::events::CombatEventName;
use ashfall_core::state::GameState;
use ashfall_content::defs::MobDef;
use ashfall_content::ContentRegistry;

use crate::emit::emit;
use crate::session;

/// The three non-violent resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassiveAction {
    Hunt,
    Capture,
    Negotiate,
}

fn refusal(action: PassiveAction, name: &str) -> String {
    match action {
        PassiveAction::Hunt => {
            format!("Il {name} è troppo aggressivo per essere cacciato facilmente.")
        }
        PassiveAction::Capture => {
            format!("Il {name} si oppone troppo fieramente per essere catturato.")
        }
        PassiveAction::Negotiate => format!("Il {name} non sembra interessato a negoziare."),
    }
}

/// Dispatch a passive interaction against the resolved target.
pub fn interact<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    action: PassiveAction,
    target: Option<usize>,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    {
        let session = state
            .combat
            .as_ref()
            .ok_or_else(|| ActionError::precondition("Non sei in combattimento."))?;
        if session.phase != CombatPhase::Player {
            return Err(ActionError::precondition("Non è il tuo turno."));
        }
    }

    let index = crate::commands::resolve_target_index(state, target)?;
    let (enemy_id, enemy_name, base_id) = {
        let session = state.combat.as_ref().expect("in combat");
        let enemy = &session.enemies[index];
        (enemy.id.clone(), enemy.name.clone(), enemy.base_id.clone())
    };
    let mob = registry
        .mob(&base_id)
        .ok_or_else(|| ActionError::not_found(format!("Nemico sconosciuto: {base_id}")))?;

    // Current behavioral state, not the content default: a failed hunt
    // may already have turned the target cautious.
    let ai_state = state
        .combat
        .as_ref()
        .and_then(|s| s.combatants.get(&enemy_id))
        .map(|c| c.ai_state)
        .unwrap_or(mob.ai_state);
    if !matches!(
        ai_state,
        AiState::Passive | AiState::Surrendered | AiState::Fleeing
    ) {
        return Ok(ActionResult::line(refusal(action, &enemy_name)));
    }

    if let Some(session) = state.combat.as_mut() {
        session.last_player_action_real = now_real;
    }

    let result = match action {
        PassiveAction::Hunt => hunt(state, registry, mob, index, &enemy_id, &enemy_name, now_real, rng),
        PassiveAction::Capture => capture(
            state, registry, mob, ai_state, index, &enemy_id, &enemy_name, now_real, rng,
        ),
        PassiveAction::Negotiate => {
            negotiate(state, registry, mob, index, &enemy_id, &enemy_name, now_real, rng)
        }
    };
    session::check_end(state, registry, now_real, rng);
    result
}

#[allow(clippy::too_many_arguments)]
fn hunt<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    mob: &MobDef,
    index: usize,
    enemy_id: &str,
    enemy_name: &str,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    let traits = &mob.behavioral_traits;
    if !traits.is_animal {
        return Ok(ActionResult::line(format!(
            "Non puoi cacciare {enemy_name} - non è un animale."
        )));
    }
    let wounded = {
        let session = state.combat.as_ref().expect("in combat");
        let enemy = &session.enemies[index];
        (enemy.hp as f64) < enemy.max_hp as f64 * 0.5
    };
    let base_success = if wounded { 0.7 } else { 0.4 };
    let roll = rng.gen::<f64>();
    let mut lines = Vec::new();

    if roll < base_success {
        {
            let session = state.combat.as_mut().expect("in combat");
            session.enemies[index].hp = 0;
        }
        lines.push(format!("Riesci a cacciare {enemy_name} con successo."));
        // Clean kills yield more usable parts; chance still caps at 1.
        let drops = session::roll_loot(&mob.loot_table, 1.5, false, rng);
        if !drops.is_empty() {
            session::award_loot(state, registry, &drops, enemy_name, now_real);
        }
        // Death already looted here, skip the generic hook.
        state
            .combat
            .as_mut()
            .expect("in combat")
            .loot_processed
            .insert(enemy_id.to_string());
        match traits.moral_impact.as_str() {
            "negative" => lines.push(
                "Senti un peso sulla coscienza per aver ucciso una creatura innocente.".to_string(),
            ),
            "neutral" => lines.push("È la legge della sopravvivenza.".to_string()),
            _ => {}
        }
        if traits.moral_impact == "negative" {
            state.set_flag("hunted_innocent", true);
        }
        emit(
            state,
            CombatEventName::SuccessfulHunt,
            now_real,
            serde_json::json!({"target_id": enemy_id, "moral_impact": traits.moral_impact}),
        );
    } else if roll < base_success + traits.flee_chance {
        lines.push(format!("{enemy_name} ti sfugge e scappa via!"));
        let session = state.combat.as_mut().expect("in combat");
        session.enemies[index].hp = 0;
        session.loot_processed.insert(enemy_id.to_string());
        emit(
            state,
            CombatEventName::PreyEscaped,
            now_real,
            serde_json::json!({"target_id": enemy_id}),
        );
    } else {
        lines.push(format!(
            "{enemy_name} percepisce il pericolo e assume una posizione difensiva."
        ));
        if let Some(c) = state
            .combat
            .as_mut()
            .and_then(|s| s.combatants.get_mut(enemy_id))
        {
            c.ai_state = AiState::Cautious;
        }
    }
    Ok(ActionResult::from_lines(lines))
}

#[allow(clippy::too_many_arguments)]
fn capture<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    mob: &MobDef,
    ai_state: AiState,
    index: usize,
    enemy_id: &str,
    enemy_name: &str,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    if ai_state != AiState::Surrendered {
        return Ok(ActionResult::line(format!(
            "{enemy_name} non si è arreso - non puoi catturarlo."
        )));
    }
    let traits = &mob.behavioral_traits;
    let base_success = if traits.surrender_complete { 0.8 } else { 0.5 };
    let mut lines = Vec::new();

    if rng.gen::<f64>() < base_success {
        {
            let session = state.combat.as_mut().expect("in combat");
            session.enemies[index].hp = 0;
            session.loot_processed.insert(enemy_id.to_string());
        }
        lines.push(format!("Catturi {enemy_name} con successo."));
        // Searching a prisoner turns up what they carry.
        let drops = session::roll_loot(&mob.loot_table, 1.0, true, rng);
        if !drops.is_empty() {
            session::award_loot(state, registry, &drops, enemy_name, now_real);
        }
        if traits.has_family_photo {
            lines.push(
                "Frugando tra i suoi effetti personali, trovi una foto di famiglia...".to_string(),
            );
            lines.push("Ti fa riflettere sulla tua decisione.".to_string());
        }
        emit(
            state,
            CombatEventName::SuccessfulCapture,
            now_real,
            serde_json::json!({"target_id": enemy_id, "has_story": traits.has_personal_story}),
        );
    } else if traits.has_hidden_weapon {
        lines.push(format!("{enemy_name} estrae un'arma nascosta e ti attacca!"));
        if let Some(c) = state
            .combat
            .as_mut()
            .and_then(|s| s.combatants.get_mut(enemy_id))
        {
            c.ai_state = AiState::Aggressive;
        }
        let damage = traits.hidden_weapon_damage;
        state.player_hp = (state.player_hp - damage).max(0);
        lines.push(format!(
            "Vieni colpito per {damage} danni! HP: {}/{}",
            state.player_hp, state.player_max_hp
        ));
    } else {
        lines.push(format!("{enemy_name} si irrigidisce e oppone resistenza."));
    }
    Ok(ActionResult::from_lines(lines))
}

#[allow(clippy::too_many_arguments)]
fn negotiate<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    mob: &MobDef,
    index: usize,
    enemy_id: &str,
    enemy_name: &str,
    now_real: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    let traits = &mob.behavioral_traits;
    if !traits.can_negotiate {
        return Ok(ActionResult::line(format!(
            "{enemy_name} non sembra in grado di negoziare."
        )));
    }
    let default_outcomes = vec![
        ashfall_content::defs::NegotiationOutcome {
            success: true,
            message: "Si allontana rapidamente senza fare storie.".to_string(),
            loot: None,
        },
        ashfall_content::defs::NegotiationOutcome {
            success: false,
            message: "Scuote la testa e rimane in posizione difensiva.".to_string(),
            loot: None,
        },
    ];
    let outcomes = if mob.negotiation_outcomes.is_empty() {
        &default_outcomes
    } else {
        &mob.negotiation_outcomes
    };
    let outcome = outcomes[rng.gen_range(0..outcomes.len())].clone();
    let mut lines = Vec::new();

    if outcome.success {
        {
            let session = state.combat.as_mut().expect("in combat");
            session.enemies[index].hp = 0;
            session.loot_processed.insert(enemy_id.to_string());
        }
        lines.push(format!("Riesci a negoziare con {enemy_name}."));
        lines.push(outcome.message.clone());
        if let Some(gift) = &outcome.loot {
            let rules = registry.stack_rules(gift);
            if state.inventory.add(gift, 1, rules).is_ok() {
                lines.push(format!(
                    "Ti offre {} come segno di gratitudine.",
                    registry.object_name(gift)
                ));
            }
        }
        lines.push("Ti senti meglio per aver risolto la situazione pacificamente.".to_string());
        emit(
            state,
            CombatEventName::SuccessfulNegotiation,
            now_real,
            serde_json::json!({"target_id": enemy_id, "peaceful_resolution": true}),
        );
    } else {
        lines.push(format!(
            "Il tentativo di negoziazione con {enemy_name} fallisce."
        ));
        lines.push(outcome.message.clone());
        if traits.becomes_hostile_on_failed_negotiation {
            if let Some(c) = state
                .combat
                .as_mut()
                .and_then(|s| s.combatants.get_mut(enemy_id))
            {
                c.ai_state = AiState::Aggressive;
            }
            lines.push(format!("{enemy_name} diventa ostile!"));
        }
    }
    Ok(ActionResult::from_lines(lines))
}
