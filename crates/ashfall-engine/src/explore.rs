//! Exploration actions: look, go, wait, wait_until, where, and the
//! inspect → examine → search gated chain, plus the ambient snippet
//! rate limiter.

use rand::Rng;

use ashfall_core::action::ActionResult;
use ashfall_core::enums::{Climate, Daytime, Weather};
use ashfall_core::errors::ActionError;
use ashfall_core::state::GameState;
use ashfall_content::model::{InteractableRef, MicroRoom, VisibleFlag};
use ashfall_content::ContentRegistry;
use ashfall_events::events::{EventSystem, RoomTrigger};

/// Ambient snippet catalog keyed by phase and weather token.
fn ambient_snippets(key: &str) -> &'static [&'static str] {
    match key {
        "mattina" => &[
            "Una corrente d'aria fresca porta l'odore dell'erba bagnata.",
            "La luce obliqua rivela dettagli che a mezzogiorno svaniranno.",
        ],
        "giorno" => &[
            "Un ronzio diffuso di insetti scandisce la quiete.",
            "Una foglia cade roteando lentamente.",
        ],
        "sera" => &[
            "Toni ambrati tingono le superfici esposte.",
            "Un richiamo lontano viene inghiottito dal bosco.",
        ],
        "notte" => &[
            "Una luminescenza appena percettibile pulsa tra il fogliame.",
            "Il bosco sembra trattenere ogni suono superfluo.",
        ],
        "pioggia" => &[
            "Gocce irregolari compongono un ritmo organico.",
            "Il terreno rilascia vapori terrosi.",
        ],
        "nebbia" => &[
            "Profili distanti si dissolvono in latte diffuso.",
            "L'umidità condensa in perle sulle superfici rugose.",
        ],
        _ => &[],
    }
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Scene header: `[HH:MM Giorno N | Fase | Meteo | Clima]`.
pub fn scene_header(state: &GameState) -> String {
    format!(
        "[{} Giorno {} | {} | {} | {}]",
        state.clock.time_string(),
        state.clock.day_count,
        capitalize(state.clock.daytime.as_str()),
        capitalize(state.clock.weather.as_str()),
        capitalize(state.clock.climate.as_str()),
    )
}

/// Pick an ambient snippet, subject to the minimum-gap rate limiter.
///
/// Test overrides on the state force a key or an exact text for one
/// emission, then clear.
pub fn ambient_line<R: Rng>(state: &mut GameState, rng: &mut R) -> Option<String> {
    let now_total = state.total_minutes();
    if now_total - state.last_ambient_emit_total < state.ambient_min_gap_minutes {
        return None;
    }
    if let Some(exact) = state.force_ambient_exact.take() {
        state.force_ambient_key = None;
        state.last_ambient_line = Some(exact.clone());
        state.last_ambient_emit_total = now_total;
        return Some(exact);
    }
    let mut options: Vec<&'static str> = if let Some(key) = state.force_ambient_key.take() {
        ambient_snippets(&key).to_vec()
    } else {
        let mut options = ambient_snippets(state.clock.weather.as_str()).to_vec();
        options.extend_from_slice(ambient_snippets(state.clock.daytime.as_str()));
        options
    };
    if options.is_empty() {
        return None;
    }
    // Avoid repeating the previous snippet when alternatives exist.
    if let Some(last) = &state.last_ambient_line {
        if options.len() > 1 {
            let filtered: Vec<&'static str> =
                options.iter().copied().filter(|o| o != last).collect();
            if !filtered.is_empty() {
                options = filtered;
            }
        }
    }
    let choice = options[rng.gen_range(0..options.len())].to_string();
    state.last_ambient_line = Some(choice.clone());
    state.last_ambient_emit_total = now_total;
    Some(choice)
}

fn visible_flag_holds(flag: VisibleFlag, state: &GameState) -> bool {
    match flag {
        VisibleFlag::IsDaytime => {
            matches!(state.clock.daytime, Daytime::Morning | Daytime::Day)
        }
        VisibleFlag::IsMorning => state.clock.daytime == Daytime::Morning,
        VisibleFlag::IsRainy => state.clock.weather == Weather::Rain,
        VisibleFlag::IsSpring => state.clock.climate == Climate::Humid,
        VisibleFlag::HasExaminedMarker => state.flag_truthy("has_examined_marker"),
    }
}

/// Interactables currently visible in a room.
pub fn visible_interactables<'a>(
    micro: &'a MicroRoom,
    state: &GameState,
) -> Vec<&'a InteractableRef> {
    micro
        .interactables
        .iter()
        .filter(|obj| {
            obj.visible_flag
                .map(|f| visible_flag_holds(f, state))
                .unwrap_or(true)
        })
        .collect()
}

fn exits_line(micro: &MicroRoom, state: &GameState, registry: &ContentRegistry) -> Option<String> {
    if micro.exits.is_empty() {
        return None;
    }
    let parts: Vec<String> = micro
        .exits
        .iter()
        .map(|exit| {
            let target_name = registry
                .get_micro(&exit.target_micro)
                .map(|m| m.name.as_str())
                .unwrap_or(exit.target_micro.as_str());
            let unlocked = !exit.locked
                || exit
                    .lock_flag
                    .as_deref()
                    .is_some_and(|f| state.flag_truthy(f));
            if unlocked {
                format!("{}: {}", exit.direction, target_name)
            } else {
                format!("{}: {} (bloccata)", exit.direction, target_name)
            }
        })
        .collect();
    Some(format!("Uscite: {}", parts.join(", ")))
}

/// Compose the scene: header, description (full on first visit, delta
/// variant on signature change, name only otherwise), one rate-limited
/// ambient snippet, visible interactables, exits.
pub fn look<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    let micro = registry
        .get_micro(&state.current_micro)
        .ok_or_else(|| ActionError::not_found(format!("Luogo sconosciuto: {}", state.current_micro)))?
        .clone();

    let first_visit = !state.visited_micro.contains(&micro.id);
    let signature = format!(
        "{}|{}",
        state.clock.daytime.as_str(),
        state.clock.weather.as_str()
    );
    let last_signature = state.micro_last_signature.get(&micro.id).cloned();
    let daytime_token = state.clock.daytime.as_str();
    let weather_token = state.clock.weather.as_str();
    let dynamic = registry.compose_area_description(&micro.id, daytime_token, weather_token);

    let mut lines = vec![scene_header(state)];
    if first_visit {
        lines.push(dynamic);
    } else if last_signature.as_deref() != Some(signature.as_str()) {
        // Signature changed: emphasize only the variant fragment.
        let base = registry.area_description(&micro.id);
        let variation = dynamic
            .strip_prefix(base)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&dynamic);
        lines.push(format!("{} — {}", registry.area_name(&micro.id), variation));
    } else {
        lines.push(registry.area_name(&micro.id).to_string());
    }

    if !first_visit {
        if let Some(ambient) = ambient_line(state, rng) {
            lines.push(ambient);
        }
    }

    let visible = visible_interactables(&micro, state);
    if !visible.is_empty() {
        lines.push("Qui noti:".to_string());
        for obj in &visible {
            lines.push(format!(
                "- {}: {}",
                registry.object_name(&obj.id),
                registry.object_description(&obj.id)
            ));
        }
    }

    let mut hints = Vec::new();
    if let Some(exits) = exits_line(&micro, state, registry) {
        hints.push(exits.clone());
        lines.push(exits);
    }

    state.visited_micro.insert(micro.id.clone());
    *state.visit_counts.entry(micro.id.clone()).or_insert(0) += 1;
    state.micro_last_signature.insert(micro.id.clone(), signature);

    Ok(ActionResult {
        lines,
        hints,
        events_triggered: Vec::new(),
        changes: Default::default(),
    })
}

/// Move through an exit: exact case-insensitive direction match, lock
/// check, room-exit/room-entry events, then a fresh look.
pub fn go<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    events: &EventSystem,
    direction: &str,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    let direction = direction.trim().to_lowercase();
    let micro = registry
        .get_micro(&state.current_micro)
        .ok_or_else(|| ActionError::not_found(format!("Luogo sconosciuto: {}", state.current_micro)))?;
    let exit = micro
        .exits
        .iter()
        .find(|e| e.direction.to_lowercase() == direction)
        .ok_or_else(|| ActionError::invalid(format!("Nessuna uscita '{direction}' da qui.")))?
        .clone();
    if exit.locked
        && !exit
            .lock_flag
            .as_deref()
            .is_some_and(|f| state.flag_truthy(f))
    {
        return Err(ActionError::precondition("L'uscita è bloccata."));
    }

    let old_key = state.location_key();
    let mut event_lines = events.process_room_events(&old_key, RoomTrigger::OnExit, state, rng);

    state.current_micro = exit.target_micro.clone();
    if let Some(target_macro) = &exit.target_macro {
        state.current_macro = target_macro.clone();
    } else if let Some(owner) = registry.macro_of(&exit.target_micro) {
        state.current_macro = owner.to_string();
    }

    let new_key = state.location_key();
    event_lines.extend(events.process_room_events(&new_key, RoomTrigger::OnEnter, state, rng));

    let mut result = look(state, registry, rng)?;
    let mut lines = event_lines;
    lines.append(&mut result.lines);
    result.lines = lines;
    result
        .changes
        .insert("location".into(), serde_json::Value::String(new_key));
    Ok(result)
}

/// Let simulated time pass by advancing the manual offset; weather
/// re-evaluates for every elapsed stride.
pub fn wait<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    minutes: i64,
    now_ts: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    if minutes < 0 {
        return Err(ActionError::invalid("Non puoi attendere un tempo negativo."));
    }
    if minutes == 0 {
        return Ok(ActionResult::line("Non passa alcun tempo."));
    }
    state.clock.wait(minutes);
    let total = state.clock.recompute(now_ts);
    state.clock.advance_weather_if_due(total, rng);

    let _ = registry
        .get_micro(&state.current_micro)
        .ok_or_else(|| ActionError::not_found("Posizione corrente non trovata dopo wait."))?;
    let mut lines = vec![scene_header(state)];
    lines.push(format!(
        "Lasci trascorrere {minutes} minuti immerso nel contesto. Il tempo ora è {} e l'atmosfera sembra {}.",
        state.clock.time_string(),
        state.clock.weather.as_str()
    ));
    if let Some(ambient) = ambient_line(state, rng) {
        lines.push(ambient);
    }
    Ok(ActionResult::from_lines(lines)
        .with_change("waited", serde_json::Value::Number(minutes.into())))
}

/// Wait until the start of a phase band, wrapping past midnight.
pub fn wait_until<R: Rng>(
    state: &mut GameState,
    registry: &ContentRegistry,
    phase: &str,
    now_ts: f64,
    rng: &mut R,
) -> Result<ActionResult, ActionError> {
    let target = Daytime::parse(phase.trim())
        .ok_or_else(|| ActionError::invalid(format!("Fase sconosciuta: {phase}")))?;
    if state.clock.daytime == target {
        return Ok(ActionResult::line("Sei già in questa fase della giornata."));
    }
    let delta = state.clock.minutes_until(target);
    wait(state, registry, delta, now_ts, rng)
}

/// Current position, macro and micro.
pub fn where_am_i(
    state: &GameState,
    registry: &ContentRegistry,
) -> Result<ActionResult, ActionError> {
    let macro_name = registry
        .get_macro(&state.current_macro)
        .map(|m| m.name.as_str())
        .unwrap_or(state.current_macro.as_str());
    let micro_name = registry.area_name(&state.current_micro);
    Ok(
        ActionResult::line(format!("Ti trovi in {macro_name} — {micro_name}.")).with_change(
            "location",
            serde_json::Value::String(state.location_key()),
        ),
    )
}

/// Player overview outside combat.
pub fn player_status(state: &GameState, registry: &ContentRegistry) -> ActionResult {
    let mut lines = vec![scene_header(state)];
    lines.push(format!("HP: {}/{}", state.player_hp, state.player_max_hp));
    match state
        .player_weapon_id
        .as_deref()
        .and_then(|id| registry.weapon(id))
    {
        Some(weapon) => lines.push(format!("Arma: {}", weapon.name)),
        None => lines.push("Arma: nessuna".to_string()),
    }
    lines.push(format!("Morale: {}", state.stats.morale()));
    lines.push(format!(
        "Peso trasportato: {:.1}/{:.1}",
        state.inventory.carried_weight, state.inventory.max_weight
    ));
    ActionResult::from_lines(lines)
}

// --- Gated interaction chain ---

/// Interaction tiers in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionTier {
    Inspect,
    Examine,
    Search,
}

/// Resolve a partial name against the visible interactables of the
/// current room. Ambiguity lists the candidates.
pub fn resolve_interactable(
    state: &GameState,
    registry: &ContentRegistry,
    name: &str,
) -> Result<String, ActionError> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return Err(ActionError::invalid("Specifica un oggetto."));
    }
    let micro = registry
        .get_micro(&state.current_micro)
        .ok_or_else(|| ActionError::not_found(format!("Luogo sconosciuto: {}", state.current_micro)))?;
    let candidates: Vec<&InteractableRef> = visible_interactables(micro, state)
        .into_iter()
        .filter(|obj| {
            obj.id.to_lowercase().contains(&needle)
                || obj
                    .alias
                    .as_deref()
                    .is_some_and(|a| a.to_lowercase().contains(&needle))
                || registry
                    .object_name(&obj.id)
                    .to_lowercase()
                    .contains(&needle)
        })
        .collect();
    match candidates.as_slice() {
        [] => Err(ActionError::not_found(format!("Non vedi nessun '{name}' qui."))),
        [single] => Ok(single.id.clone()),
        many => {
            let names: Vec<&str> = many.iter().map(|o| registry.object_name(&o.id)).collect();
            Err(ActionError::invalid(format!(
                "Ambiguo: intendi {}?",
                names.join(" o ")
            )))
        }
    }
}

fn progress_flag(tier: InteractionTier, object_id: &str) -> String {
    match tier {
        InteractionTier::Inspect => format!("inspected_{object_id}"),
        InteractionTier::Examine => format!("examined_{object_id}"),
        InteractionTier::Search => format!("searched_{object_id}"),
    }
}

/// Run one tier of the gated chain: `examine` requires a prior
/// `inspect`, `search` a prior `examine`. Each tier records a
/// per-object progress flag and hints at the next tier when its text
/// exists.
pub fn interact(
    state: &mut GameState,
    registry: &ContentRegistry,
    tier: InteractionTier,
    name: &str,
) -> Result<ActionResult, ActionError> {
    let object_id = resolve_interactable(state, registry, name)?;
    let display = registry.object_name(&object_id).to_string();
    let texts = registry
        .strings
        .oggetti
        .get(&object_id)
        .map(|o| o.interazioni.clone())
        .unwrap_or_default();

    let mut lines = Vec::new();
    let mut hints = Vec::new();
    match tier {
        InteractionTier::Inspect => {
            let flag = progress_flag(tier, &object_id);
            let first_time = !state.flag_truthy(&flag);
            let text = if first_time {
                texts
                    .inspect_first
                    .unwrap_or_else(|| registry.object_description(&object_id).to_string())
            } else {
                texts
                    .inspect_repeat
                    .unwrap_or_else(|| format!("Osservi di nuovo {display}: nulla di nuovo."))
            };
            lines.push(text);
            state.set_flag(&flag, true);
            if texts.examine.is_some() {
                hints.push(format!("Potresti esaminare più a fondo: examine {object_id}"));
            }
        }
        InteractionTier::Examine => {
            if !state.flag_truthy(&progress_flag(InteractionTier::Inspect, &object_id)) {
                return Err(ActionError::precondition(format!(
                    "Devi prima osservare {display} (inspect)."
                )));
            }
            let text = texts
                .examine
                .unwrap_or_else(|| format!("Esamini {display} con attenzione."));
            lines.push(text);
            state.set_flag(&progress_flag(tier, &object_id), true);
            state.set_flag(&format!("has_examined_{object_id}"), true);
            if texts.search.is_some() {
                hints.push(format!("Potresti frugare a fondo: search {object_id}"));
            }
        }
        InteractionTier::Search => {
            if !state.flag_truthy(&progress_flag(InteractionTier::Examine, &object_id)) {
                return Err(ActionError::precondition(format!(
                    "Devi prima esaminare {display} (examine)."
                )));
            }
            let text = texts
                .search
                .unwrap_or_else(|| format!("Frughi intorno a {display}, senza trovare altro."));
            lines.push(text);
            state.set_flag(&progress_flag(tier, &object_id), true);
        }
    }
    Ok(ActionResult {
        lines,
        hints,
        events_triggered: Vec::new(),
        changes: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashfall_content::loader::build_world;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const NOW: f64 = 1_700_000_000.0;

    fn registry() -> ContentRegistry {
        let world = build_world(serde_json::json!({
            "id": "w", "name": "W",
            "macro_rooms": [{
                "id": "forest", "name": "Foresta",
                "micro_rooms": [
                    {"id": "clearing", "name": "Radura", "short": "Radura",
                     "description": "Erba alta ovunque.",
                     "exits": [
                        {"direction": "nord", "target_micro": "creek"},
                        {"direction": "est", "target_micro": "creek",
                         "locked": true, "lock_flag": "gate_open"}
                     ],
                     "interactables": [
                        {"id": "cippo"},
                        {"id": "funghi", "visible_flag": "is_rainy"}
                     ]},
                    {"id": "creek", "name": "Torrente", "short": "Torrente",
                     "description": "Acqua bassa."}
                ]
            }]
        }))
        .unwrap();
        let mut registry = ContentRegistry::new(world);
        registry.strings = serde_json::from_value(serde_json::json!({
            "aree": {
                "clearing": {
                    "nome": "Radura", "descrizione": "Erba alta ovunque.",
                    "varianti": {"pioggia": "Le gocce piegano gli steli."}
                },
                "creek": {"nome": "Torrente", "descrizione": "Acqua bassa."}
            },
            "oggetti": {
                "cippo": {
                    "nome": "Cippo di pietra", "descrizione": "Simboli consumati.",
                    "interazioni": {
                        "inspect_first": "Un cippo antico, coperto di muschio.",
                        "inspect_repeat": "Il cippo è sempre lì, immobile.",
                        "examine": "Sotto il muschio si intuiscono incisioni.",
                        "search": "Alla base trovi un incavo vuoto."
                    }
                },
                "funghi": {"nome": "Funghi", "descrizione": "Spuntano dopo la pioggia."}
            }
        }))
        .unwrap();
        registry
    }

    fn state() -> GameState {
        let mut s = GameState::new("w", "forest", "clearing");
        s.clock.recompute(NOW);
        s
    }

    #[test]
    fn first_look_shows_full_description_then_name_only() {
        let registry = registry();
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let first = look(&mut s, &registry, &mut rng).unwrap();
        assert!(first.lines[0].starts_with("[06:00 Giorno 0 | Mattina"));
        assert!(first.lines[1].contains("Erba alta ovunque."));
        assert_eq!(s.visit_counts["clearing"], 1);

        let repeat = look(&mut s, &registry, &mut rng).unwrap();
        assert_eq!(repeat.lines[1], "Radura");
        assert_eq!(s.visit_counts["clearing"], 2);
    }

    #[test]
    fn signature_change_emits_delta_variant() {
        let registry = registry();
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        look(&mut s, &registry, &mut rng).unwrap();
        s.clock.weather = Weather::Rain;
        let result = look(&mut s, &registry, &mut rng).unwrap();
        assert!(result.lines[1].starts_with("Radura — "));
        assert!(result.lines[1].contains("Le gocce piegano gli steli."));
    }

    #[test]
    fn rain_gated_interactable_appears_only_in_rain() {
        let registry = registry();
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let dry = look(&mut s, &registry, &mut rng).unwrap();
        assert!(!dry.lines.iter().any(|l| l.contains("Funghi")));
        s.clock.weather = Weather::Rain;
        let wet = look(&mut s, &registry, &mut rng).unwrap();
        assert!(wet.lines.iter().any(|l| l.contains("Funghi")));
    }

    #[test]
    fn locked_exit_shows_and_blocks_until_flag() {
        let registry = registry();
        let events = EventSystem::default();
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = look(&mut s, &registry, &mut rng).unwrap();
        assert!(result
            .lines
            .iter()
            .any(|l| l.contains("est: Torrente (bloccata)")));

        let err = go(&mut s, &registry, &events, "est", &mut rng).unwrap_err();
        assert!(matches!(err, ActionError::PreconditionFailed(_)));
        s.set_flag("gate_open", true);
        let moved = go(&mut s, &registry, &events, "est", &mut rng).unwrap();
        assert_eq!(s.current_micro, "creek");
        assert_eq!(
            moved.changes["location"],
            serde_json::Value::String("forest:creek".into())
        );
    }

    #[test]
    fn unknown_direction_is_invalid_argument() {
        let registry = registry();
        let events = EventSystem::default();
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            go(&mut s, &registry, &events, "ovest", &mut rng),
            Err(ActionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn wait_zero_is_a_noop_message() {
        let registry = registry();
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = wait(&mut s, &registry, 0, NOW, &mut rng).unwrap();
        assert_eq!(result.lines, vec!["Non passa alcun tempo."]);
        assert!(wait(&mut s, &registry, -5, NOW, &mut rng).is_err());
    }

    #[test]
    fn wait_until_reaches_the_band_start() {
        let registry = registry();
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        wait_until(&mut s, &registry, "sera", NOW, &mut rng).unwrap();
        assert_eq!(s.clock.daytime, Daytime::Evening);
        assert_eq!(s.clock.time_string(), "18:00");

        let already = wait_until(&mut s, &registry, "sera", NOW, &mut rng).unwrap();
        assert!(already.lines[0].contains("già"));
    }

    #[test]
    fn ambient_respects_min_gap_and_overrides() {
        let registry = registry();
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        look(&mut s, &registry, &mut rng).unwrap(); // first visit: no ambient

        s.force_ambient_exact = Some("Testo forzato.".to_string());
        let forced = look(&mut s, &registry, &mut rng).unwrap();
        assert!(forced.lines.contains(&"Testo forzato.".to_string()));
        assert!(s.force_ambient_exact.is_none(), "override clears after one use");

        // Within the gap: no snippet. Header, name, interactable
        // listing (two lines), exits.
        let gated = look(&mut s, &registry, &mut rng).unwrap();
        assert_eq!(gated.lines.len(), 5);

        s.clock.wait(s.ambient_min_gap_minutes + 1);
        s.clock.recompute(NOW);
        let after_gap = look(&mut s, &registry, &mut rng).unwrap();
        assert_eq!(after_gap.lines.len(), 6, "snippet returns after the gap");
    }

    #[test]
    fn gated_chain_enforces_order_and_flags() {
        let registry = registry();
        let mut s = state();

        let err = interact(&mut s, &registry, InteractionTier::Examine, "cippo").unwrap_err();
        assert!(matches!(err, ActionError::PreconditionFailed(_)));

        let first = interact(&mut s, &registry, InteractionTier::Inspect, "cippo").unwrap();
        assert_eq!(first.lines[0], "Un cippo antico, coperto di muschio.");
        assert!(!first.hints.is_empty());
        assert!(s.flag_truthy("inspected_cippo"));

        let repeat = interact(&mut s, &registry, InteractionTier::Inspect, "cippo").unwrap();
        assert_eq!(repeat.lines[0], "Il cippo è sempre lì, immobile.");

        let err = interact(&mut s, &registry, InteractionTier::Search, "cippo").unwrap_err();
        assert!(matches!(err, ActionError::PreconditionFailed(_)));

        let examined = interact(&mut s, &registry, InteractionTier::Examine, "cippo").unwrap();
        assert!(examined.lines[0].contains("incisioni"));
        assert!(s.flag_truthy("has_examined_cippo"));

        let searched = interact(&mut s, &registry, InteractionTier::Search, "cippo").unwrap();
        assert!(searched.lines[0].contains("incavo"));
        assert!(s.flag_truthy("searched_cippo"));
    }

    #[test]
    fn partial_name_resolution_and_ambiguity() {
        let registry = registry();
        let mut s = state();
        // "cip" matches only the cippo.
        assert_eq!(resolve_interactable(&s, &registry, "cip").unwrap(), "cippo");
        // Unknown object.
        assert!(matches!(
            resolve_interactable(&s, &registry, "altare"),
            Err(ActionError::NotFound(_))
        ));
        // With rain the funghi appear; "f" matches... only funghi, while
        // a vacuous needle stays invalid.
        s.clock.weather = Weather::Rain;
        assert!(matches!(
            resolve_interactable(&s, &registry, "  "),
            Err(ActionError::InvalidArgument(_))
        ));
    }
}
