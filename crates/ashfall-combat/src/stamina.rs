//! Stamina rules: costs, regeneration, accuracy penalty bands.
//!
//! Pure functions over [`Combatant`] — no registry, no session.

use ashfall_core::constants::*;
use ashfall_core::state::Combatant;

use crate::models::MoveSpec;

pub fn has_stamina_for(c: &Combatant, move_spec: &MoveSpec) -> bool {
    c.stamina >= move_spec.stamina_cost
}

/// Consume stamina; returns false (and leaves the pool untouched) when
/// short.
pub fn consume(c: &mut Combatant, amount: i32) -> bool {
    if c.stamina < amount {
        return false;
    }
    c.stamina -= amount;
    true
}

pub fn restore(c: &mut Combatant, amount: i32) {
    c.stamina = (c.stamina + amount).min(c.max_stamina);
}

pub fn is_exhausted(c: &Combatant) -> bool {
    c.stamina <= 0
}

/// Hit-quality multiplier by stamina ratio: 1.0 above 30%, 0.8 above
/// 10%, 0.5 below.
pub fn penalty(c: &Combatant) -> f64 {
    if c.max_stamina == 0 {
        return 1.0;
    }
    let ratio = c.stamina_ratio();
    if ratio > STAMINA_PENALTY_BAND_HIGH {
        1.0
    } else if ratio > STAMINA_PENALTY_BAND_LOW {
        0.8
    } else {
        0.5
    }
}

pub fn tick_regen(c: &mut Combatant) {
    restore(c, STAMINA_REGEN_PER_TICK);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combatant(stamina: i32, max: i32) -> Combatant {
        Combatant {
            stamina,
            max_stamina: max,
            ..Combatant::player()
        }
    }

    #[test]
    fn consume_is_all_or_nothing() {
        let mut c = combatant(10, 100);
        assert!(!consume(&mut c, 11));
        assert_eq!(c.stamina, 10);
        assert!(consume(&mut c, 10));
        assert_eq!(c.stamina, 0);
    }

    #[test]
    fn penalty_bands() {
        assert_eq!(penalty(&combatant(100, 100)), 1.0);
        assert_eq!(penalty(&combatant(31, 100)), 1.0);
        assert_eq!(penalty(&combatant(30, 100)), 0.8);
        assert_eq!(penalty(&combatant(11, 100)), 0.8);
        assert_eq!(penalty(&combatant(10, 100)), 0.5);
        assert_eq!(penalty(&combatant(0, 100)), 0.5);
    }

    #[test]
    fn regen_caps_at_max() {
        let mut c = combatant(98, 100);
        tick_regen(&mut c);
        assert_eq!(c.stamina, 100);
    }
}
