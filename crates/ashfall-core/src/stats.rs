//! Player statistics with temporary modifiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A timed adjustment to a single stat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: String,
    pub delta: i64,
    /// Simulated minutes left before the modifier expires.
    pub remaining_minutes: i64,
    pub source: String,
}

/// Named integer stats plus a list of active temporary modifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStats {
    pub base: BTreeMap<String, i64>,
    pub modifiers: Vec<StatModifier>,
}

impl Default for PlayerStats {
    fn default() -> Self {
        let mut base = BTreeMap::new();
        base.insert("morale".to_string(), 50);
        Self {
            base,
            modifiers: Vec::new(),
        }
    }
}

impl PlayerStats {
    /// Effective value: base plus every active modifier.
    pub fn get(&self, name: &str) -> i64 {
        let base = self.base.get(name).copied().unwrap_or(0);
        let bonus: i64 = self
            .modifiers
            .iter()
            .filter(|m| m.stat == name)
            .map(|m| m.delta)
            .sum();
        base + bonus
    }

    pub fn set(&mut self, name: &str, value: i64) {
        self.base.insert(name.to_string(), value);
    }

    pub fn add(&mut self, name: &str, delta: i64) {
        *self.base.entry(name.to_string()).or_insert(0) += delta;
    }

    pub fn add_modifier(&mut self, modifier: StatModifier) {
        self.modifiers.push(modifier);
    }

    /// Age modifiers by elapsed simulated minutes, dropping expired ones.
    pub fn tick(&mut self, elapsed_minutes: i64) {
        if elapsed_minutes <= 0 {
            return;
        }
        for m in &mut self.modifiers {
            m.remaining_minutes -= elapsed_minutes;
        }
        self.modifiers.retain(|m| m.remaining_minutes > 0);
    }

    pub fn morale(&self) -> i64 {
        self.get("morale")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_applies_and_expires() {
        let mut stats = PlayerStats::default();
        stats.add_modifier(StatModifier {
            stat: "morale".into(),
            delta: 15,
            remaining_minutes: 30,
            source: "hot_meal".into(),
        });
        assert_eq!(stats.get("morale"), 65);
        stats.tick(29);
        assert_eq!(stats.get("morale"), 65);
        stats.tick(1);
        assert_eq!(stats.get("morale"), 50);
        assert!(stats.modifiers.is_empty());
    }

    #[test]
    fn missing_stat_defaults_to_zero() {
        let stats = PlayerStats::default();
        assert_eq!(stats.get("observation"), 0);
    }
}
