//! Engine configuration.
//!
//! Defaults match shipped tuning; the environment can override the time
//! scale (`ASHFALL_TIME_SCALE`). Invalid overrides fall back silently to
//! the default, with a warning on the log.

use serde::{Deserialize, Serialize};

/// Simulated minutes that pass per real second by default.
pub const DEFAULT_TIME_SCALE: f64 = 0.25;

/// Environment variable overriding the time scale.
pub const ENV_TIME_SCALE: &str = "ASHFALL_TIME_SCALE";

/// Dialogue backend settings. The core only reads these; transport lives
/// with the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: f64,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "local".to_string(),
            timeout_seconds: 20.0,
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

/// All recognized engine knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub time_scale: f64,
    /// Alphanumeric QTE codes instead of single characters.
    pub complex_qte: bool,
    pub qte_code_len_min: usize,
    pub qte_code_len_max: usize,
    pub qte_alphabet: String,
    /// Simulated minutes granted to react to an offensive QTE.
    pub offensive_qte_window_minutes: i64,
    /// Simulated minutes granted to parry an incoming attack.
    pub defensive_qte_window_minutes: i64,
    /// Wall seconds of player inactivity before enemies accelerate.
    pub inactivity_attack_seconds: f64,
    pub min_attack_all_cooldown_minutes: i64,
    pub ambient_min_gap_minutes: i64,
    pub oracle: OracleConfig,
    /// Wall seconds between front-end realtime polls.
    pub tick_interval_seconds: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_scale: DEFAULT_TIME_SCALE,
            complex_qte: false,
            qte_code_len_min: 3,
            qte_code_len_max: 5,
            qte_alphabet: "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string(),
            offensive_qte_window_minutes: 2,
            defensive_qte_window_minutes: 1,
            inactivity_attack_seconds: 20.0,
            min_attack_all_cooldown_minutes: 2,
            ambient_min_gap_minutes: crate::constants::AMBIENT_MIN_GAP_MINUTES,
            oracle: OracleConfig::default(),
            tick_interval_seconds: 1.0,
        }
    }
}

impl EngineConfig {
    /// Default config with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(ENV_TIME_SCALE) {
            match raw.parse::<f64>() {
                Ok(v) if v > 0.0 => config.time_scale = v,
                _ => log::warn!("ignoring invalid {ENV_TIME_SCALE}={raw:?}"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert!((config.time_scale - 0.25).abs() < 1e-9);
        assert!(config.qte_code_len_min <= config.qte_code_len_max);
        assert!(config.qte_alphabet.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.qte_code_len_max, config.qte_code_len_max);
        assert_eq!(back.oracle.model, config.oracle.model);
    }
}
