//! Action result record returned by every action entry point.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Narrative output plus a structured summary of what changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionResult {
    /// Narrative lines to display, in order.
    pub lines: Vec<String>,
    /// Proximity hints (exit summaries, next-tier pointers).
    pub hints: Vec<String>,
    /// Ids of events fired during the action.
    pub events_triggered: Vec<String>,
    /// Machine-readable change summary.
    pub changes: BTreeMap<String, serde_json::Value>,
}

impl ActionResult {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            ..Self::default()
        }
    }

    pub fn line(text: impl Into<String>) -> Self {
        Self::from_lines(vec![text.into()])
    }

    pub fn with_change(mut self, key: &str, value: serde_json::Value) -> Self {
        self.changes.insert(key.to_string(), value);
        self
    }
}
