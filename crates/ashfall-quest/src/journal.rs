//! Branched journal: contextual variant selection and placeholder
//! substitution.
//!
//! Node keys follow `q.<quest>.<step>.<variant>`. Variant precedence,
//! most specific first: weather-exact, generic rain, phase-exact,
//! generic night, location, mood (outside the 30–70 morale band), base.

use std::collections::BTreeMap;

use ashfall_core::enums::Daytime;
use ashfall_core::state::{GameState, JournalEntry};

use crate::model::Quest;

/// Build a standard node key.
pub fn node_key(quest_id: &str, step_id: &str, variant: &str) -> String {
    format!("q.{quest_id}.{step_id}.{variant}")
}

fn best_variant<'a>(quest: &'a Quest, base_key: &str, state: &GameState) -> Option<&'a String> {
    let key_base = base_key.strip_suffix(".default").unwrap_or(base_key);
    let nodes = &quest.journal_nodes;

    let weather_key = format!("{key_base}.{}", state.clock.weather.as_str());
    if let Some(text) = nodes.get(&weather_key) {
        return Some(text);
    }
    if state.clock.weather.is_rainy() {
        if let Some(text) = nodes.get(&format!("{key_base}.rain")) {
            return Some(text);
        }
    }
    let phase_key = format!("{key_base}.{}", state.clock.daytime.as_str());
    if let Some(text) = nodes.get(&phase_key) {
        return Some(text);
    }
    if state.clock.daytime == Daytime::Night {
        if let Some(text) = nodes.get(&format!("{key_base}.night")) {
            return Some(text);
        }
    }
    if let Some(text) = nodes.get(&format!("{key_base}.{}", state.current_micro)) {
        return Some(text);
    }
    let morale = state.stats.morale();
    if morale < 30 {
        if let Some(text) = nodes.get(&format!("{key_base}.desperate")) {
            return Some(text);
        }
    } else if morale > 70 {
        if let Some(text) = nodes.get(&format!("{key_base}.hopeful")) {
            return Some(text);
        }
    }
    nodes.get(base_key)
}

/// Replace `{npc:id}` markers through the name table; unknown ids keep
/// the raw id.
fn replace_npc_names(text: &str, npc_names: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{npc:") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 5..];
        match tail.find('}') {
            Some(end) => {
                let id = &tail[..end];
                match npc_names.get(id) {
                    Some(name) => out.push_str(name),
                    None => out.push_str(id),
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

fn replace_placeholders(
    text: &str,
    ctx: &BTreeMap<String, String>,
    npc_names: &BTreeMap<String, String>,
    state: &GameState,
) -> String {
    let mut out = text.to_string();
    for (key, value) in ctx {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out = out.replace("{time}", &state.clock.time_string());
    out = out.replace("{weather}", state.clock.weather.as_str());
    out = out.replace("{location}", &state.current_micro);
    out = out.replace("{day}", &state.clock.day_count.to_string());
    out = out.replace("{morale}", &state.stats.morale().to_string());
    replace_npc_names(&out, npc_names)
}

/// Emit a journal entry for a node key, append it to the state's
/// journal history, and return the rendered text.
///
/// A missing key yields `[Missing journal entry: <key>]` (still
/// recorded, so the gap is visible in the journal).
pub fn emit(
    quest: &Quest,
    key: &str,
    ctx: &BTreeMap<String, String>,
    npc_names: &BTreeMap<String, String>,
    state: &mut GameState,
) -> String {
    let text = match best_variant(quest, key, state) {
        Some(variant) => replace_placeholders(variant, ctx, npc_names, state),
        None => format!("[Missing journal entry: {key}]"),
    };
    let entry = JournalEntry {
        quest_id: quest.id.clone(),
        node_key: key.to_string(),
        text: text.clone(),
        timestamp: state.clock.time_minutes,
        weather: state.clock.weather,
        location: format!("{}/{}", state.current_macro, state.current_micro),
    };
    state.push_journal(entry);
    text
}

/// Most recent journal entries, newest last.
pub fn recent_entries(state: &GameState, limit: usize) -> &[JournalEntry] {
    let len = state.journal_history.len();
    &state.journal_history[len.saturating_sub(limit)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashfall_core::enums::Weather;

    fn state() -> GameState {
        let mut s = GameState::new("w", "kitchen", "bench");
        s.clock.recompute(1_700_000_000.0);
        s
    }

    fn quest_with_nodes(nodes: &[(&str, &str)]) -> Quest {
        let mut quest = Quest::new("wq", "Weather quest");
        for (k, v) in nodes {
            quest.journal_nodes.insert(k.to_string(), v.to_string());
        }
        quest
    }

    #[test]
    fn weather_exact_beats_generic_rain_beats_default() {
        let quest = quest_with_nodes(&[
            ("q.wq.s1.default", "A"),
            ("q.wq.s1.rain", "R"),
            ("q.wq.s1.pioggia", "P"),
        ]);
        let ctx = BTreeMap::new();
        let names = BTreeMap::new();

        let mut s = state();
        s.clock.weather = Weather::Rain;
        assert_eq!(emit(&quest, "q.wq.s1.default", &ctx, &names, &mut s), "P");

        // Storm has no exact variant: generic rain applies.
        s.clock.weather = Weather::Storm;
        assert_eq!(emit(&quest, "q.wq.s1.default", &ctx, &names, &mut s), "R");

        s.clock.weather = Weather::Clear;
        assert_eq!(emit(&quest, "q.wq.s1.default", &ctx, &names, &mut s), "A");
    }

    #[test]
    fn night_variant_applies_at_night() {
        let quest = quest_with_nodes(&[("q.wq.s1.default", "A"), ("q.wq.s1.night", "N")]);
        let ctx = BTreeMap::new();
        let names = BTreeMap::new();
        let mut s = state();
        s.clock.wait(17 * 60); // 06:00 -> 23:00
        s.clock.recompute(1_700_000_000.0);
        assert_eq!(emit(&quest, "q.wq.s1.default", &ctx, &names, &mut s), "N");
    }

    #[test]
    fn mood_variant_only_outside_band() {
        let quest = quest_with_nodes(&[
            ("q.wq.s1.default", "A"),
            ("q.wq.s1.desperate", "D"),
            ("q.wq.s1.hopeful", "H"),
        ]);
        let ctx = BTreeMap::new();
        let names = BTreeMap::new();
        let mut s = state();
        assert_eq!(emit(&quest, "q.wq.s1.default", &ctx, &names, &mut s), "A");
        s.stats.set("morale", 20);
        assert_eq!(emit(&quest, "q.wq.s1.default", &ctx, &names, &mut s), "D");
        s.stats.set("morale", 80);
        assert_eq!(emit(&quest, "q.wq.s1.default", &ctx, &names, &mut s), "H");
    }

    #[test]
    fn placeholders_and_npc_names() {
        let quest = quest_with_nodes(&[(
            "q.wq.s1.default",
            "{npc:clem} alle {time}, meteo {weather}, morale {morale}, extra {note}",
        )]);
        let mut ctx = BTreeMap::new();
        ctx.insert("note".to_string(), "ok".to_string());
        let mut names = BTreeMap::new();
        names.insert("clem".to_string(), "Clementine".to_string());
        let mut s = state();
        let text = emit(&quest, "q.wq.s1.default", &ctx, &names, &mut s);
        assert_eq!(text, "Clementine alle 06:00, meteo sereno, morale 50, extra ok");
    }

    #[test]
    fn missing_key_is_marked() {
        let quest = quest_with_nodes(&[]);
        let ctx = BTreeMap::new();
        let names = BTreeMap::new();
        let mut s = state();
        let text = emit(&quest, "q.wq.s9.default", &ctx, &names, &mut s);
        assert_eq!(text, "[Missing journal entry: q.wq.s9.default]");
        assert_eq!(s.journal_history.len(), 1);
    }

    #[test]
    fn history_records_scene_stamp() {
        let quest = quest_with_nodes(&[("q.wq.s1.default", "A")]);
        let mut s = state();
        emit(&quest, "q.wq.s1.default", &BTreeMap::new(), &BTreeMap::new(), &mut s);
        let entry = &s.journal_history[0];
        assert_eq!(entry.quest_id, "wq");
        assert_eq!(entry.location, "kitchen/bench");
        assert_eq!(entry.timestamp, 6 * 60);
    }
}
