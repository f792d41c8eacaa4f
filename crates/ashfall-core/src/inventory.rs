//! Weight-limited stacked inventory and equipment slots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::ActionError;

/// A stack of one item kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: String,
    pub quantity: u32,
}

/// Physical properties an inventory needs to know about an item.
/// Resolved by the caller from the content registry.
#[derive(Debug, Clone, Copy)]
pub struct StackRules {
    pub unit_weight: f64,
    pub stack_max: u32,
}

impl Default for StackRules {
    fn default() -> Self {
        Self {
            unit_weight: 0.0,
            stack_max: 1,
        }
    }
}

/// Ordered stacks under a total weight cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub stacks: Vec<ItemStack>,
    pub max_weight: f64,
    /// Cached carried weight, kept in sync by add/remove.
    pub carried_weight: f64,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            stacks: Vec::new(),
            max_weight: 30.0,
            carried_weight: 0.0,
        }
    }
}

impl Inventory {
    /// Total quantity of an item across stacks.
    pub fn count(&self, item_id: &str) -> u32 {
        self.stacks
            .iter()
            .filter(|s| s.item_id == item_id)
            .map(|s| s.quantity)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Add items, filling existing stacks before opening new ones.
    /// Fails without mutating if the weight cap would be exceeded.
    pub fn add(&mut self, item_id: &str, qty: u32, rules: StackRules) -> Result<(), ActionError> {
        if qty == 0 {
            return Ok(());
        }
        let added_weight = rules.unit_weight * qty as f64;
        if self.carried_weight + added_weight > self.max_weight {
            return Err(ActionError::precondition(format!(
                "Troppo peso: non puoi trasportare altri {qty}x {item_id}."
            )));
        }
        let stack_max = rules.stack_max.max(1);
        let mut remaining = qty;
        for stack in self
            .stacks
            .iter_mut()
            .filter(|s| s.item_id == item_id && s.quantity < stack_max)
        {
            let room = stack_max - stack.quantity;
            let take = room.min(remaining);
            stack.quantity += take;
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }
        while remaining > 0 {
            let take = remaining.min(stack_max);
            self.stacks.push(ItemStack {
                item_id: item_id.to_string(),
                quantity: take,
            });
            remaining -= take;
        }
        self.carried_weight += added_weight;
        Ok(())
    }

    /// Remove up to `qty` items; fails without mutating when short.
    pub fn remove(
        &mut self,
        item_id: &str,
        qty: u32,
        unit_weight: f64,
    ) -> Result<(), ActionError> {
        if self.count(item_id) < qty {
            return Err(ActionError::not_found(format!(
                "Non hai abbastanza {item_id}."
            )));
        }
        let mut remaining = qty;
        for stack in self.stacks.iter_mut().filter(|s| s.item_id == item_id) {
            let take = stack.quantity.min(remaining);
            stack.quantity -= take;
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }
        self.stacks.retain(|s| s.quantity > 0);
        self.carried_weight = (self.carried_weight - unit_weight * qty as f64).max(0.0);
        Ok(())
    }
}

/// Equipment slots mapping slot name to the equipped item id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Equipment {
    pub slots: BTreeMap<String, String>,
}

impl Equipment {
    pub fn equipped(&self, slot: &str) -> Option<&str> {
        self.slots.get(slot).map(String::as_str)
    }

    /// Equip into a slot, returning the previously equipped item if any.
    pub fn equip(&mut self, slot: &str, item_id: &str) -> Option<String> {
        self.slots.insert(slot.to_string(), item_id.to_string())
    }

    pub fn unequip(&mut self, slot: &str) -> Option<String> {
        self.slots.remove(slot)
    }

    /// Find the slot an item is currently equipped in.
    pub fn slot_of(&self, item_id: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|(_, v)| v.as_str() == item_id)
            .map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(weight: f64, stack_max: u32) -> StackRules {
        StackRules {
            unit_weight: weight,
            stack_max,
        }
    }

    #[test]
    fn stacks_fill_before_new_ones_open() {
        let mut inv = Inventory::default();
        inv.add("bandage", 3, rules(0.1, 4)).unwrap();
        inv.add("bandage", 3, rules(0.1, 4)).unwrap();
        assert_eq!(inv.count("bandage"), 6);
        assert_eq!(inv.stacks.len(), 2);
        assert_eq!(inv.stacks[0].quantity, 4);
        assert_eq!(inv.stacks[1].quantity, 2);
    }

    #[test]
    fn weight_cap_blocks_without_mutation() {
        let mut inv = Inventory {
            max_weight: 5.0,
            ..Inventory::default()
        };
        inv.add("scrap", 4, rules(1.0, 10)).unwrap();
        let err = inv.add("scrap", 2, rules(1.0, 10)).unwrap_err();
        assert!(matches!(err, ActionError::PreconditionFailed(_)));
        assert_eq!(inv.count("scrap"), 4);
        assert!((inv.carried_weight - 4.0).abs() < 1e-9);
    }

    #[test]
    fn remove_is_all_or_nothing() {
        let mut inv = Inventory::default();
        inv.add("ammo", 5, rules(0.02, 30)).unwrap();
        assert!(inv.remove("ammo", 6, 0.02).is_err());
        assert_eq!(inv.count("ammo"), 5);
        inv.remove("ammo", 5, 0.02).unwrap();
        assert!(inv.is_empty());
    }

    #[test]
    fn equip_unequip_roundtrip() {
        let mut eq = Equipment::default();
        assert_eq!(eq.equip("weapon", "knife"), None);
        assert_eq!(eq.equipped("weapon"), Some("knife"));
        assert_eq!(eq.slot_of("knife"), Some("weapon"));
        assert_eq!(eq.unequip("weapon"), Some("knife".to_string()));
        assert!(eq.slots.is_empty());
    }
}
