//! Strict reply schema for the dialogue oracle.
//!
//! `deny_unknown_fields` plus explicit range checks stand in for a JSON
//! Schema engine: same accept/reject surface, no extra dependency.

use serde::{Deserialize, Serialize};

use ashfall_core::enums::Mood;
use ashfall_core::errors::ActionError;

/// A memory record the NPC wants to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryWrite {
    /// `episodic` or `semantic`.
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Episodic,
    Semantic,
}

/// The oracle's structured reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NpcReply {
    pub npc_id: String,
    pub mood: Mood,
    /// Validated against the intent whitelist.
    pub intent: String,
    pub say: String,
    /// Validated against the action whitelist and game state.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub memory_write: Vec<MemoryWrite>,
    #[serde(default)]
    pub relationship_delta: i64,
    #[serde(default)]
    pub directives: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default = "default_stop_after")]
    pub stop_speaking_after: i64,
}

fn default_stop_after() -> i64 {
    1
}

/// Maximum length of the spoken line.
pub const MAX_SAY_LEN: usize = 160;

/// Maximum length of a memory value.
pub const MAX_MEMORY_VALUE_LEN: usize = 240;

/// Extract the JSON object between the first `{` and the last `}` —
/// oracles sometimes wrap their JSON in prose.
pub fn extract_json(raw: &str) -> Result<&str, ActionError> {
    let start = raw
        .find('{')
        .ok_or_else(|| ActionError::SchemaInvalid("no JSON found in response".into()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| ActionError::SchemaInvalid("no JSON found in response".into()))?;
    if end < start {
        return Err(ActionError::SchemaInvalid("no JSON found in response".into()));
    }
    Ok(&raw[start..=end])
}

/// Structural validation: parse plus range/length checks.
pub fn validate_schema(raw: &str) -> Result<NpcReply, ActionError> {
    let json = extract_json(raw)?;
    let reply: NpcReply = serde_json::from_str(json)
        .map_err(|e| ActionError::SchemaInvalid(format!("schema violation: {e}")))?;
    if reply.npc_id.is_empty() {
        return Err(ActionError::SchemaInvalid("empty npc_id".into()));
    }
    if reply.say.is_empty() || reply.say.chars().count() > MAX_SAY_LEN {
        return Err(ActionError::SchemaInvalid("say length out of bounds".into()));
    }
    if !(-2..=2).contains(&reply.relationship_delta) {
        return Err(ActionError::SchemaInvalid(
            "relationship_delta out of [-2, 2]".into(),
        ));
    }
    if let Some(confidence) = reply.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ActionError::SchemaInvalid("confidence out of [0, 1]".into()));
        }
    }
    if !(0..=2).contains(&reply.stop_speaking_after) {
        return Err(ActionError::SchemaInvalid(
            "stop_speaking_after out of [0, 2]".into(),
        ));
    }
    for memory in &reply.memory_write {
        if memory.value.chars().count() > MAX_MEMORY_VALUE_LEN {
            return Err(ActionError::SchemaInvalid("memory value too long".into()));
        }
    }
    Ok(reply)
}
