//! Runtime registry for loaded content.
//!
//! In-memory indices for quick lookup without traversing the nested
//! world graph, plus centralized access to localized strings and the
//! combat/item definition tables. Read-only after boot.

use std::collections::BTreeMap;
use std::path::Path;

use ashfall_core::inventory::StackRules;

use crate::defs::{ItemDef, LootTableDef, MobDef, RecipeDef, WeaponDef};
use crate::loader::{self, ContentError};
use crate::model::{MacroRoom, MicroRoom, World};
use crate::strings::Strings;

/// Immutable content shared by every subsystem.
#[derive(Debug, Clone)]
pub struct ContentRegistry {
    pub world: World,
    /// micro id -> owning macro id.
    micro_index: BTreeMap<String, String>,
    pub strings: Strings,
    pub weapons: BTreeMap<String, WeaponDef>,
    pub mobs: BTreeMap<String, MobDef>,
    pub items: BTreeMap<String, ItemDef>,
    pub loot_tables: BTreeMap<String, LootTableDef>,
    pub recipes: BTreeMap<String, RecipeDef>,
}

impl ContentRegistry {
    pub fn new(world: World) -> Self {
        let mut micro_index = BTreeMap::new();
        for macro_room in world.macro_rooms.values() {
            for micro_id in macro_room.micro_rooms.keys() {
                micro_index.insert(micro_id.clone(), macro_room.id.clone());
            }
        }
        Self {
            world,
            micro_index,
            strings: Strings::default(),
            weapons: BTreeMap::new(),
            mobs: BTreeMap::new(),
            items: BTreeMap::new(),
            loot_tables: BTreeMap::new(),
            recipes: BTreeMap::new(),
        }
    }

    /// Build a registry from a content tree:
    /// `world.json`, `strings.json`, and `weapons/`, `mobs/`, `items/`,
    /// `loot/`, `recipes/` directories under `root`.
    pub fn load_from_dir(root: &Path) -> Result<Self, ContentError> {
        let world = loader::load_world(&root.join("world.json"))?;
        let mut registry = Self::new(world);
        let strings_path = root.join("strings.json");
        if strings_path.exists() {
            registry.strings = loader::load_strings(&strings_path)?;
        }
        registry.weapons = loader::load_weapons(&root.join("weapons"));
        registry.mobs = loader::load_mobs(&root.join("mobs"));
        registry.items = loader::load_items(&root.join("items"));
        registry.loot_tables = loader::load_loot_tables(&root.join("loot"));
        registry.recipes = loader::load_recipes(&root.join("recipes"));
        Ok(registry)
    }

    pub fn get_micro(&self, micro_id: &str) -> Option<&MicroRoom> {
        let macro_id = self.micro_index.get(micro_id)?;
        self.world.macro_rooms.get(macro_id)?.micro_rooms.get(micro_id)
    }

    pub fn get_macro(&self, macro_id: &str) -> Option<&MacroRoom> {
        self.world.macro_rooms.get(macro_id)
    }

    /// Owning macro id for a micro room.
    pub fn macro_of(&self, micro_id: &str) -> Option<&str> {
        self.micro_index.get(micro_id).map(String::as_str)
    }

    pub fn weapon(&self, id: &str) -> Option<&WeaponDef> {
        self.weapons.get(id)
    }

    pub fn mob(&self, id: &str) -> Option<&MobDef> {
        self.mobs.get(id)
    }

    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    /// Stacking rules for an item; unknown items behave as unstackable
    /// and weightless.
    pub fn stack_rules(&self, item_id: &str) -> StackRules {
        self.items
            .get(item_id)
            .map(|def| StackRules {
                unit_weight: def.weight,
                stack_max: def.stack_max.max(1),
            })
            .unwrap_or_default()
    }

    // --- Localized string access ---

    pub fn object_name<'a>(&'a self, object_id: &'a str) -> &'a str {
        // Item definitions win over the string table for carried goods.
        if let Some(item) = self.items.get(object_id) {
            return &item.name;
        }
        self.strings.object_name(object_id)
    }

    pub fn object_description(&self, object_id: &str) -> &str {
        self.strings.object_description(object_id)
    }

    pub fn area_name<'a>(&'a self, micro_id: &'a str) -> &'a str {
        self.strings.area_name(micro_id)
    }

    pub fn area_description(&self, micro_id: &str) -> &str {
        self.strings.area_description(micro_id)
    }

    pub fn compose_area_description(
        &self,
        micro_id: &str,
        daytime_token: &str,
        weather_token: &str,
    ) -> String {
        self.strings
            .compose_area_description(micro_id, daytime_token, weather_token)
    }
}
