//! Transient combat records: moves, damage, resolution results.

use ashfall_core::enums::{DamageType, HitQuality, MoveType, StatusEffect};
use ashfall_core::events::CombatEventName;
use ashfall_core::state::StatusEffectInstance;

/// Specification for a combat move, derived from weapon + move type.
#[derive(Debug, Clone)]
pub struct MoveSpec {
    pub id: String,
    pub name: String,
    pub move_type: MoveType,
    pub stamina_cost: i32,
    pub reach: i32,
    pub windup_time: i32,
    pub recovery_time: i32,
    pub noise_level: i32,
    pub damage_base: f64,
    pub damage_type: DamageType,
    /// `(effect, duration ticks, intensity)` applied on hit.
    pub status_effects: Vec<(StatusEffect, i32, f64)>,
}

/// Damage to be applied, typed and graded.
#[derive(Debug, Clone)]
pub struct DamageInstance {
    pub amount: f64,
    pub damage_type: DamageType,
    pub source: Option<String>,
    pub hit_quality: HitQuality,
}

/// Situational modifiers feeding hit quality.
#[derive(Debug, Clone, Copy, Default)]
pub struct SituationalModifiers {
    pub flanking: bool,
    pub cover: bool,
    pub darkness: bool,
    pub rain: bool,
}

/// Result of one attack resolution.
#[derive(Debug, Default)]
pub struct CombatResult {
    pub success: bool,
    pub damage_dealt: Vec<DamageInstance>,
    pub status_effects_applied: Vec<StatusEffectInstance>,
    pub stamina_consumed: i32,
    pub posture_damage: f64,
    pub hit_quality: HitQuality,
    pub description: Vec<String>,
    /// Telemetry events produced during resolution.
    pub events: Vec<(CombatEventName, serde_json::Value)>,
}

impl CombatResult {
    pub fn total_damage(&self) -> f64 {
        self.damage_dealt.iter().map(|d| d.amount).sum()
    }

    /// Display/apply convention: damage is rounded once, here.
    pub fn damage_int(&self) -> i32 {
        (self.total_damage().round() as i32).max(0)
    }
}
