//! Oracle orchestration: prompt assembly, validation, effect
//! application, graceful fallback.

use std::collections::BTreeSet;

use ashfall_core::enums::Mood;
use ashfall_core::errors::ActionError;
use ashfall_core::state::GameState;

use crate::memory::MemoryStore;
use crate::schema::{validate_schema, NpcReply};

/// The pluggable dialogue backend. The core is agnostic to transport;
/// tests inject a stub.
pub trait Oracle {
    fn call(&self, system: &str, user: &str) -> Result<String, ActionError>;
}

/// Static data describing an NPC for prompting and validation.
#[derive(Debug, Clone)]
pub struct NpcProfile {
    pub id: String,
    pub name: String,
    pub persona: String,
    pub goals: Vec<String>,
    pub taboo: String,
    /// Items the NPC carries, for action gating.
    pub inventory: Vec<String>,
    /// Where the NPC currently is.
    pub current_micro: Option<String>,
}

/// Scene information handed to the oracle.
#[derive(Debug, Clone, Default)]
pub struct SceneContext {
    pub place: String,
    pub weather: String,
    pub daytime: String,
    pub player_line: String,
}

const SYSTEM_PROMPT: &str = "You are {name}, an NPC in a text-adventure engine.\n\
Personality: {persona}. Goals: {goals}. Taboo: {taboo}.\n\
World rules: Only output STRICT JSON matching the provided schema.\n\
Steps:\n\
1) Decide an intent from the allowed list.\n\
2) Optional action from the allowed list.\n\
3) Generate a SHORT 'say' line (max 160 chars).\n\
4) Optionally write memories (episodic/semantic).\n\
5) Adjust relationship (-2..+2).\n\
6) Output JSON ONLY. No extra text.\n\
Allowed intents: {intents}\n\
Allowed actions: {actions}\n";

fn build_system_prompt(
    npc: &NpcProfile,
    intents: &BTreeSet<String>,
    actions: &BTreeSet<String>,
) -> String {
    SYSTEM_PROMPT
        .replace("{name}", &npc.name)
        .replace("{persona}", &npc.persona)
        .replace("{goals}", &npc.goals.join(", "))
        .replace("{taboo}", &npc.taboo)
        .replace("{intents}", &format!("{intents:?}"))
        .replace("{actions}", &format!("{actions:?}"))
}

fn build_user_prompt(context: &SceneContext, memories: &[crate::schema::MemoryWrite]) -> String {
    serde_json::json!({
        "context": {
            "place": context.place,
            "weather": context.weather,
            "daytime": context.daytime,
            "player_says": context.player_line,
        },
        "memories": memories,
        "schema_hint": "Use the exact keys: npc_id,mood,intent,action,say,\
memory_write,relationship_delta,directives,confidence,stop_speaking_after",
    })
    .to_string()
}

/// Semantic validation of a structurally valid reply: whitelists plus
/// game-state checks for actions that need items or co-location.
pub fn validate_semantics(
    reply: &NpcReply,
    npc: &NpcProfile,
    state: &GameState,
    intents: &BTreeSet<String>,
    actions: &BTreeSet<String>,
) -> Result<(), ActionError> {
    if !intents.contains(&reply.intent) {
        return Err(ActionError::SemanticInvalid("intent_not_allowed".into()));
    }
    let Some(action) = reply.action.as_deref() else {
        return Ok(());
    };
    if !actions.contains(action) {
        return Err(ActionError::SemanticInvalid("action_not_allowed".into()));
    }
    // Give-item actions follow the convention `give_<item>_to_<whom>`.
    if let Some(rest) = action.strip_prefix("give_") {
        if let Some((item, _)) = rest.split_once("_to_") {
            if !npc.inventory.iter().any(|i| i == item) {
                return Err(ActionError::SemanticInvalid("action_missing_item".into()));
            }
        }
    }
    // Melee needs co-location with the player.
    if action == "attack_melee" {
        if let Some(npc_micro) = npc.current_micro.as_deref() {
            if npc_micro != state.current_micro {
                return Err(ActionError::SemanticInvalid("action_too_far".into()));
            }
        }
    }
    Ok(())
}

fn fallback(npc_id: &str, error: &ActionError) -> NpcReply {
    NpcReply {
        npc_id: npc_id.to_string(),
        mood: Mood::Neutral,
        intent: "evade".to_string(),
        say: "...".to_string(),
        action: None,
        memory_write: Vec::new(),
        relationship_delta: 0,
        directives: vec![format!("error:{error}")],
        confidence: None,
        stop_speaking_after: 1,
    }
}

/// Execute one NPC turn.
///
/// Calls the oracle, validates structure and semantics, persists any
/// memory writes, and applies the relationship delta clamped to
/// `[-10, 10]`. Any failure returns the neutral fallback — this
/// function never errors out.
pub fn npc_turn(
    oracle: &dyn Oracle,
    npc: &NpcProfile,
    state: &mut GameState,
    context: &SceneContext,
    store: &MemoryStore,
    intents: &BTreeSet<String>,
    actions: &BTreeSet<String>,
    now_ts: i64,
) -> NpcReply {
    let query_terms: Vec<&str> = vec!["player", context.place.as_str(), context.weather.as_str()];
    let memories = store.retrieve(&npc.id, &query_terms, 5);

    let system = build_system_prompt(npc, intents, actions);
    let user = build_user_prompt(context, &memories);

    let raw = match oracle.call(&system, &user) {
        Ok(raw) => raw,
        Err(err) => {
            log::warn!("oracle transport failure for npc '{}': {err}", npc.id);
            return fallback(&npc.id, &err);
        }
    };
    let reply = match validate_schema(&raw) {
        Ok(reply) => reply,
        Err(err) => {
            log::warn!("oracle reply rejected for npc '{}': {err}", npc.id);
            return fallback(&npc.id, &err);
        }
    };
    if let Err(err) = validate_semantics(&reply, npc, state, intents, actions) {
        log::warn!("oracle reply semantically invalid for npc '{}': {err}", npc.id);
        return fallback(&npc.id, &err);
    }

    if !reply.memory_write.is_empty() {
        if let Err(err) = store.write(&npc.id, &reply.memory_write, now_ts) {
            log::warn!("memory write failed for npc '{}': {err}", npc.id);
        }
    }
    if reply.relationship_delta != 0 {
        let entry = state.relationships.entry(npc.id.clone()).or_insert(0);
        *entry = (*entry + reply.relationship_delta).clamp(-10, 10);
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubOracle(String);

    impl Oracle for StubOracle {
        fn call(&self, _system: &str, _user: &str) -> Result<String, ActionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingOracle;

    impl Oracle for FailingOracle {
        fn call(&self, _system: &str, _user: &str) -> Result<String, ActionError> {
            Err(ActionError::Transient("timeout".into()))
        }
    }

    fn npc() -> NpcProfile {
        NpcProfile {
            id: "clem".into(),
            name: "Clementine".into(),
            persona: "wary survivor".into(),
            goals: vec!["stay alive".into()],
            taboo: "nothing specific".into(),
            inventory: vec!["bandage".into()],
            current_micro: Some("clearing".into()),
        }
    }

    fn whitelists() -> (BTreeSet<String>, BTreeSet<String>) {
        let intents: BTreeSet<String> = ["greet", "evade", "trade"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let actions: BTreeSet<String> = ["give_bandage_to_player", "attack_melee"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        (intents, actions)
    }

    fn state() -> GameState {
        let mut s = GameState::new("w", "forest", "clearing");
        s.clock.recompute(1_700_000_000.0);
        s
    }

    fn store(name: &str) -> MemoryStore {
        let dir = std::env::temp_dir().join(format!("ashfall_adapter_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        MemoryStore::new(dir)
    }

    #[test]
    fn valid_turn_applies_relationship_and_memory() {
        let raw = serde_json::json!({
            "npc_id": "clem", "mood": "calm", "intent": "greet", "say": "Ciao.",
            "memory_write": [
                {"type": "episodic", "key": "met_player", "value": "primo incontro"}
            ],
            "relationship_delta": 2
        })
        .to_string();
        let (intents, actions) = whitelists();
        let store = store("valid");
        let mut s = state();
        let reply = npc_turn(
            &StubOracle(raw),
            &npc(),
            &mut s,
            &SceneContext::default(),
            &store,
            &intents,
            &actions,
            42,
        );
        assert_eq!(reply.intent, "greet");
        assert_eq!(s.relationships["clem"], 2);
        assert_eq!(store.count("clem"), 1);
        let _ = std::fs::remove_dir_all(store.base_dir());
    }

    #[test]
    fn relationship_clamps_at_ten() {
        let raw = serde_json::json!({
            "npc_id": "clem", "mood": "calm", "intent": "greet",
            "say": "Ciao.", "relationship_delta": 2
        })
        .to_string();
        let (intents, actions) = whitelists();
        let store = store("clamp");
        let mut s = state();
        s.relationships.insert("clem".into(), 9);
        npc_turn(
            &StubOracle(raw),
            &npc(),
            &mut s,
            &SceneContext::default(),
            &store,
            &intents,
            &actions,
            0,
        );
        assert_eq!(s.relationships["clem"], 10);
    }

    #[test]
    fn transport_failure_degrades_to_fallback() {
        let (intents, actions) = whitelists();
        let store = store("transport");
        let mut s = state();
        let reply = npc_turn(
            &FailingOracle,
            &npc(),
            &mut s,
            &SceneContext::default(),
            &store,
            &intents,
            &actions,
            0,
        );
        assert_eq!(reply.say, "...");
        assert_eq!(reply.intent, "evade");
        assert_eq!(reply.mood, Mood::Neutral);
    }

    #[test]
    fn unlisted_intent_falls_back() {
        let raw = serde_json::json!({
            "npc_id": "clem", "mood": "calm", "intent": "sing", "say": "La la."
        })
        .to_string();
        let (intents, actions) = whitelists();
        let store = store("intent");
        let mut s = state();
        let reply = npc_turn(
            &StubOracle(raw),
            &npc(),
            &mut s,
            &SceneContext::default(),
            &store,
            &intents,
            &actions,
            0,
        );
        assert_eq!(reply.intent, "evade");
    }

    #[test]
    fn give_action_requires_item() {
        let raw = serde_json::json!({
            "npc_id": "clem", "mood": "calm", "intent": "trade",
            "say": "Tieni.", "action": "give_bandage_to_player"
        })
        .to_string();
        let (intents, actions) = whitelists();
        let mut profile = npc();
        let store = store("give");
        let mut s = state();
        let reply = npc_turn(
            &StubOracle(raw.clone()),
            &profile,
            &mut s,
            &SceneContext::default(),
            &store,
            &intents,
            &actions,
            0,
        );
        assert_eq!(reply.action.as_deref(), Some("give_bandage_to_player"));

        profile.inventory.clear();
        let reply = npc_turn(
            &StubOracle(raw),
            &profile,
            &mut s,
            &SceneContext::default(),
            &store,
            &intents,
            &actions,
            0,
        );
        assert_eq!(reply.intent, "evade", "missing item rejects the action");
        let _ = std::fs::remove_dir_all(store.base_dir());
    }

    #[test]
    fn melee_requires_co_location() {
        let raw = serde_json::json!({
            "npc_id": "clem", "mood": "angry", "intent": "evade",
            "say": "Vattene!", "action": "attack_melee"
        })
        .to_string();
        let (intents, actions) = whitelists();
        let mut profile = npc();
        profile.current_micro = Some("creek".into());
        let store = store("melee");
        let mut s = state();
        let reply = npc_turn(
            &StubOracle(raw),
            &profile,
            &mut s,
            &SceneContext::default(),
            &store,
            &intents,
            &actions,
            0,
        );
        assert!(reply.action.is_none());
    }
}
