//! Status effect bookkeeping: stacking, per-tick damage, accuracy and
//! movement penalties.

use ashfall_core::constants::*;
use ashfall_core::enums::{DamageType, HitQuality, StatusEffect};
use ashfall_core::state::{Combatant, StatusEffectInstance};

use crate::models::DamageInstance;

/// Apply an effect: refresh duration to the longer of the two and stack
/// intensity at half rate, capped.
pub fn apply_effect(c: &mut Combatant, effect: StatusEffectInstance) {
    if let Some(existing) = c.effects.iter_mut().find(|e| e.effect == effect.effect) {
        if effect.duration > existing.duration {
            existing.duration = effect.duration;
        }
        existing.intensity =
            (existing.intensity + effect.intensity * 0.5).min(EFFECT_INTENSITY_CAP);
    } else {
        c.effects.push(effect);
    }
}

pub fn has_effect(c: &Combatant, effect: StatusEffect) -> bool {
    c.effects.iter().any(|e| e.effect == effect)
}

fn effect_intensity(c: &Combatant, effect: StatusEffect) -> Option<f64> {
    c.effects
        .iter()
        .find(|e| e.effect == effect)
        .map(|e| e.intensity)
}

/// Advance every effect one tick: collect DoT damage, decrement
/// durations, drop expired instances.
pub fn tick_effects(c: &mut Combatant) -> Vec<DamageInstance> {
    let mut damage = Vec::new();
    for effect in &mut c.effects {
        match effect.effect {
            StatusEffect::Bleed => damage.push(DamageInstance {
                amount: BLEED_DAMAGE_PER_INTENSITY * effect.intensity,
                damage_type: DamageType::Bleed,
                source: Some("bleed_tick".to_string()),
                hit_quality: HitQuality::Normal,
            }),
            StatusEffect::Burn => damage.push(DamageInstance {
                amount: BURN_DAMAGE_PER_INTENSITY * effect.intensity,
                damage_type: DamageType::Burn,
                source: Some("burn_tick".to_string()),
                hit_quality: HitQuality::Normal,
            }),
            // Concussed / staggered / crippled gate other systems.
            _ => {}
        }
        effect.duration -= 1;
    }
    c.effects.retain(|e| e.duration > 0);
    damage
}

/// Accuracy multiplier from active effects.
pub fn accuracy_penalty(c: &Combatant) -> f64 {
    let mut penalty = 1.0;
    if let Some(intensity) = effect_intensity(c, StatusEffect::Concussed) {
        penalty *= 1.0 - CONCUSSED_ACCURACY_LOSS_PER_INTENSITY * intensity;
    }
    if has_effect(c, StatusEffect::Staggered) {
        penalty *= STAGGERED_ACCURACY_MULT;
    }
    penalty
}

/// Movement multiplier from active effects.
pub fn movement_penalty(c: &Combatant) -> f64 {
    let mut penalty = 1.0;
    if has_effect(c, StatusEffect::Crippled) {
        penalty *= 0.5;
    }
    if has_effect(c, StatusEffect::Staggered) {
        penalty *= 0.7;
    }
    penalty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bleed(duration: i32, intensity: f64) -> StatusEffectInstance {
        StatusEffectInstance {
            effect: StatusEffect::Bleed,
            duration,
            intensity,
            source: None,
        }
    }

    #[test]
    fn stacking_caps_intensity() {
        let mut c = Combatant::player();
        apply_effect(&mut c, bleed(3, 2.0));
        for _ in 0..10 {
            apply_effect(&mut c, bleed(3, 2.0));
        }
        assert_eq!(c.effects.len(), 1);
        assert!(c.effects[0].intensity <= EFFECT_INTENSITY_CAP);
    }

    #[test]
    fn refresh_takes_longer_duration() {
        let mut c = Combatant::player();
        apply_effect(&mut c, bleed(2, 1.0));
        apply_effect(&mut c, bleed(5, 0.0));
        assert_eq!(c.effects[0].duration, 5);
        apply_effect(&mut c, bleed(1, 0.0));
        assert_eq!(c.effects[0].duration, 5);
    }

    #[test]
    fn dot_ticks_and_expires() {
        let mut c = Combatant::player();
        apply_effect(&mut c, bleed(2, 2.0));
        let first = tick_effects(&mut c);
        assert_eq!(first.len(), 1);
        assert!((first[0].amount - 2.0).abs() < 1e-9);
        assert_eq!(first[0].damage_type, DamageType::Bleed);
        let second = tick_effects(&mut c);
        assert_eq!(second.len(), 1);
        assert!(c.effects.is_empty());
        assert!(tick_effects(&mut c).is_empty());
    }

    #[test]
    fn concussion_scales_accuracy_loss() {
        let mut c = Combatant::player();
        apply_effect(
            &mut c,
            StatusEffectInstance {
                effect: StatusEffect::Concussed,
                duration: 3,
                intensity: 3.0,
                source: None,
            },
        );
        // Up to 60% loss at capped intensity.
        assert!((accuracy_penalty(&c) - 0.4).abs() < 1e-9);
    }
}
