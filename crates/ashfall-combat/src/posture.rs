//! Posture (poise): damage, regeneration, stagger on threshold
//! crossing.

use ashfall_core::constants::*;
use ashfall_core::enums::StatusEffect;
use ashfall_core::state::{Combatant, StatusEffectInstance};

/// Apply posture damage. Returns the stagger effect when the value
/// crosses the threshold downward on this hit.
pub fn damage_posture(c: &mut Combatant, damage: f64) -> Option<StatusEffectInstance> {
    let previous = c.posture;
    c.posture = (c.posture - damage).max(0.0);
    let threshold = c.stagger_threshold * c.max_posture;
    if c.posture <= threshold && previous > threshold {
        return Some(StatusEffectInstance {
            effect: StatusEffect::Staggered,
            duration: STAGGER_DURATION_TICKS,
            intensity: 1.0,
            source: Some("posture_break".to_string()),
        });
    }
    None
}

pub fn restore(c: &mut Combatant, amount: f64) {
    c.posture = (c.posture + amount).min(c.max_posture);
}

/// Attacker posture ratio minus defender posture ratio; positive favors
/// the attacker.
pub fn posture_gap(attacker: &Combatant, defender: &Combatant) -> f64 {
    attacker.posture_ratio() - defender.posture_ratio()
}

pub fn is_staggered(c: &Combatant) -> bool {
    c.posture <= c.stagger_threshold * c.max_posture
}

pub fn tick_regen(c: &mut Combatant) {
    restore(c, POSTURE_REGEN_PER_TICK);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combatant(posture: f64) -> Combatant {
        Combatant {
            posture,
            max_posture: 100.0,
            stagger_threshold: 0.3,
            ..Combatant::player()
        }
    }

    #[test]
    fn stagger_fires_only_on_downward_crossing() {
        let mut c = combatant(40.0);
        let effect = damage_posture(&mut c, 15.0).expect("crossed threshold");
        assert_eq!(effect.effect, StatusEffect::Staggered);
        assert_eq!(effect.duration, STAGGER_DURATION_TICKS);
        // Already below threshold: no second stagger.
        assert!(damage_posture(&mut c, 5.0).is_none());
    }

    #[test]
    fn posture_never_negative() {
        let mut c = combatant(3.0);
        damage_posture(&mut c, 50.0);
        assert_eq!(c.posture, 0.0);
    }

    #[test]
    fn gap_is_signed() {
        let strong = combatant(90.0);
        let weak = combatant(30.0);
        assert!(posture_gap(&strong, &weak) > 0.0);
        assert!(posture_gap(&weak, &strong) < 0.0);
    }
}
