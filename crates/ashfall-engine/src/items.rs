//! Inventory and equipment actions.

use ashfall_core::action::ActionResult;
use ashfall_core::errors::ActionError;
use ashfall_core::state::GameState;
use ashfall_core::stats::StatModifier;
use ashfall_content::defs::{ItemDef, ItemEffect};
use ashfall_content::ContentRegistry;

/// Resolve a partial item name against the carried inventory.
pub fn resolve_carried_item(
    state: &GameState,
    registry: &ContentRegistry,
    name: &str,
) -> Result<String, ActionError> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return Err(ActionError::invalid("Specifica un oggetto."));
    }
    let mut candidates: Vec<String> = Vec::new();
    for stack in &state.inventory.stacks {
        if candidates.contains(&stack.item_id) {
            continue;
        }
        let display = registry.object_name(&stack.item_id).to_lowercase();
        if stack.item_id.to_lowercase().contains(&needle) || display.contains(&needle) {
            candidates.push(stack.item_id.clone());
        }
    }
    match candidates.as_slice() {
        [] => Err(ActionError::not_found(format!("Non hai nessun '{name}'."))),
        [single] => Ok(single.clone()),
        many => {
            let names: Vec<&str> = many.iter().map(|id| registry.object_name(id)).collect();
            Err(ActionError::invalid(format!(
                "Ambiguo: intendi {}?",
                names.join(" o ")
            )))
        }
    }
}

/// List carried stacks with names, quantities, and total weight.
pub fn inventory(state: &GameState, registry: &ContentRegistry) -> ActionResult {
    if state.inventory.is_empty() && state.legacy_inventory.is_empty() {
        return ActionResult::line("Non porti nulla con te.");
    }
    let mut lines = vec!["Inventario:".to_string()];
    for stack in &state.inventory.stacks {
        let name = registry.object_name(&stack.item_id);
        if stack.quantity > 1 {
            lines.push(format!("- {name} x{}", stack.quantity));
        } else {
            lines.push(format!("- {name}"));
        }
    }
    for item in &state.legacy_inventory {
        lines.push(format!("- {}", registry.object_name(item)));
    }
    lines.push(format!(
        "Peso: {:.1}/{:.1}",
        state.inventory.carried_weight, state.inventory.max_weight
    ));
    ActionResult::from_lines(lines)
}

/// List stats, with active temporary modifiers flagged.
pub fn stats(state: &GameState) -> ActionResult {
    let mut lines = vec!["Statistiche:".to_string()];
    for (name, base) in &state.stats.base {
        let effective = state.stats.get(name);
        if effective != *base {
            lines.push(format!("- {name}: {effective} (base {base})"));
        } else {
            lines.push(format!("- {name}: {base}"));
        }
    }
    for modifier in &state.stats.modifiers {
        lines.push(format!(
            "  · {} {:+} per altri {}m ({})",
            modifier.stat, modifier.delta, modifier.remaining_minutes, modifier.source
        ));
    }
    ActionResult::from_lines(lines)
}

fn apply_item_effects(def: &ItemDef, state: &mut GameState, lines: &mut Vec<String>) {
    for effect in &def.effects {
        match effect {
            ItemEffect::HealHp { amount } => {
                let before = state.player_hp;
                state.player_hp = (state.player_hp + amount).min(state.player_max_hp);
                lines.push(format!(
                    "Recuperi {} HP ({}/{}).",
                    state.player_hp - before,
                    state.player_hp,
                    state.player_max_hp
                ));
            }
            ItemEffect::RestoreStamina { amount } => {
                if let Some(session) = state.combat.as_mut() {
                    if let Some(player) = session.combatants.get_mut("player") {
                        player.stamina = (player.stamina + amount).min(player.max_stamina);
                        lines.push(format!("Recuperi {amount} stamina."));
                    }
                }
            }
            ItemEffect::StatModifier {
                stat,
                delta,
                duration_minutes,
            } => {
                state.stats.add_modifier(StatModifier {
                    stat: stat.clone(),
                    delta: *delta,
                    remaining_minutes: *duration_minutes,
                    source: def.id.clone(),
                });
                lines.push(format!("{stat} {delta:+} per {duration_minutes} minuti."));
            }
        }
    }
}

/// Consume one unit of an item and apply its effects.
pub fn use_item(
    state: &mut GameState,
    registry: &ContentRegistry,
    name: &str,
) -> Result<ActionResult, ActionError> {
    let item_id = resolve_carried_item(state, registry, name)?;
    let def = registry
        .item(&item_id)
        .ok_or_else(|| ActionError::not_found(format!("Oggetto sconosciuto: {item_id}")))?
        .clone();
    if def.effects.is_empty() {
        return Err(ActionError::precondition(format!(
            "{} non ha un uso immediato.",
            def.name
        )));
    }
    state.inventory.remove(&item_id, 1, def.weight)?;
    let mut lines = vec![format!("Usi {}.", def.name)];
    apply_item_effects(&def, state, &mut lines);
    Ok(ActionResult::from_lines(lines))
}

/// Equip an item into its slot, returning any displaced item to the
/// inventory.
pub fn equip_item(
    state: &mut GameState,
    registry: &ContentRegistry,
    name: &str,
) -> Result<ActionResult, ActionError> {
    let item_id = resolve_carried_item(state, registry, name)?;
    let def = registry
        .item(&item_id)
        .ok_or_else(|| ActionError::not_found(format!("Oggetto sconosciuto: {item_id}")))?
        .clone();
    let slot = def
        .equip_slot
        .clone()
        .ok_or_else(|| ActionError::precondition(format!("{} non è equipaggiabile.", def.name)))?;

    state.inventory.remove(&item_id, 1, def.weight)?;
    let displaced = state.equipment.equip(&slot, &item_id);
    let mut lines = vec![format!("Equipaggi {} ({slot}).", def.name)];
    if let Some(previous) = displaced {
        let rules = registry.stack_rules(&previous);
        if state.inventory.add(&previous, 1, rules).is_ok() {
            lines.push(format!(
                "Riponi {} nello zaino.",
                registry.object_name(&previous)
            ));
        }
    }
    if slot == "weapon" {
        state.player_weapon_id = Some(item_id.clone());
        if let Some(weapon) = registry.weapon(&item_id) {
            ashfall_combat::commands::ensure_weapon_state(state, weapon);
        }
    }
    Ok(ActionResult::from_lines(lines))
}

/// Remove an equipped item by slot name or item name; it returns to
/// the inventory.
pub fn unequip_item(
    state: &mut GameState,
    registry: &ContentRegistry,
    slot_or_name: &str,
) -> Result<ActionResult, ActionError> {
    let needle = slot_or_name.trim().to_lowercase();
    let slot = if state.equipment.slots.contains_key(&needle) {
        needle
    } else {
        state
            .equipment
            .slots
            .iter()
            .find(|(_, item)| {
                item.to_lowercase().contains(&needle)
                    || registry.object_name(item).to_lowercase().contains(&needle)
            })
            .map(|(slot, _)| slot.clone())
            .ok_or_else(|| {
                ActionError::not_found(format!("Nessun equipaggiamento '{slot_or_name}'."))
            })?
    };
    let item_id = state
        .equipment
        .unequip(&slot)
        .ok_or_else(|| ActionError::not_found(format!("Slot vuoto: {slot}.")))?;
    let rules = registry.stack_rules(&item_id);
    state.inventory.add(&item_id, 1, rules)?;
    if slot == "weapon" {
        state.player_weapon_id = None;
    }
    Ok(ActionResult::line(format!(
        "Togli {}.",
        registry.object_name(&item_id)
    )))
}

/// Drop a quantity of an item.
pub fn drop_item(
    state: &mut GameState,
    registry: &ContentRegistry,
    name: &str,
    qty: u32,
) -> Result<ActionResult, ActionError> {
    let item_id = resolve_carried_item(state, registry, name)?;
    let weight = registry.item(&item_id).map(|d| d.weight).unwrap_or(0.0);
    state.inventory.remove(&item_id, qty, weight)?;
    Ok(ActionResult::line(format!(
        "Lasci a terra {} x{qty}.",
        registry.object_name(&item_id)
    )))
}

/// Describe a carried item.
pub fn examine_item(
    state: &GameState,
    registry: &ContentRegistry,
    name: &str,
) -> Result<ActionResult, ActionError> {
    let item_id = resolve_carried_item(state, registry, name)?;
    let def = registry
        .item(&item_id)
        .ok_or_else(|| ActionError::not_found(format!("Oggetto sconosciuto: {item_id}")))?;
    let mut lines = vec![def.name.clone()];
    if let Some(description) = &def.description {
        lines.push(description.clone());
    }
    lines.push(format!("Peso: {:.1}", def.weight));
    if let Some(slot) = &def.equip_slot {
        lines.push(format!("Equipaggiabile: {slot}"));
    }
    Ok(ActionResult::from_lines(lines))
}
