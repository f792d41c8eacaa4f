//! JSON content loaders.
//!
//! Directory scanners accept three file shapes: a single object carrying
//! an `id`, a list of objects, or a map of categories to lists. Duplicate
//! ids resolve last-wins over sorted path order, so loading is
//! deterministic. Malformed files or entries are skipped with a warning
//! rather than aborting the boot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::defaults::{normalize_mob, normalize_weapon, RawMobDef, RawWeaponDef};
use crate::defs::{ItemDef, LootTableDef, MobDef, RecipeDef, WeaponDef};
use crate::model::{World, MacroRoom, MicroRoom};
use crate::strings::Strings;

/// Content loading failure.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("world validation failed: {0:?}")]
    InvalidWorld(Vec<String>),
}

fn read_json(path: &Path) -> Result<Value, ContentError> {
    let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ContentError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect every object carrying an `id` out of one of the accepted
/// file shapes into `out`, last-wins.
fn collect_identified(value: Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(ref map) if map.contains_key("id") => {
            if let Some(id) = map.get("id").and_then(Value::as_str) {
                out.insert(id.to_string(), value);
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Value::Object(ref map) = item {
                    if let Some(id) = map.get("id").and_then(Value::as_str) {
                        out.insert(id.to_string(), item);
                    }
                }
            }
        }
        Value::Object(map) => {
            // Category containers, e.g. {"ranged": [...], "melee": [...]}.
            for (_, v) in map {
                if let Value::Array(items) = v {
                    for item in items {
                        if let Value::Object(ref m) = item {
                            if let Some(id) = m.get("id").and_then(Value::as_str) {
                                out.insert(id.to_string(), item);
                            }
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

/// Recursively scan a directory for `.json` files, sorted for
/// reproducible last-wins resolution.
fn scan_dir(dir: &Path, recursive: bool, out: &mut BTreeMap<String, Value>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            if recursive {
                scan_dir(&path, true, out);
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match read_json(&path) {
                Ok(value) => collect_identified(value, out),
                Err(err) => log::warn!("skipping malformed content file: {err}"),
            }
        }
    }
}

/// Load a directory of typed, id-keyed definitions.
fn load_typed<T, R, F>(dir: &Path, recursive: bool, normalize: F) -> BTreeMap<String, T>
where
    R: DeserializeOwned,
    F: Fn(R) -> T,
{
    let mut raw = BTreeMap::new();
    scan_dir(dir, recursive, &mut raw);
    let mut out = BTreeMap::new();
    for (id, value) in raw {
        match serde_json::from_value::<R>(value) {
            Ok(parsed) => {
                out.insert(id, normalize(parsed));
            }
            Err(err) => log::warn!("skipping malformed entry '{id}': {err}"),
        }
    }
    out
}

pub fn load_weapons(dir: &Path) -> BTreeMap<String, WeaponDef> {
    load_typed::<WeaponDef, RawWeaponDef, _>(dir, true, normalize_weapon)
}

pub fn load_mobs(dir: &Path) -> BTreeMap<String, MobDef> {
    load_typed::<MobDef, RawMobDef, _>(dir, true, normalize_mob)
}

pub fn load_items(dir: &Path) -> BTreeMap<String, ItemDef> {
    load_typed::<ItemDef, ItemDef, _>(dir, true, |i| i)
}

pub fn load_recipes(dir: &Path) -> BTreeMap<String, RecipeDef> {
    load_typed::<RecipeDef, RecipeDef, _>(dir, true, |r| r)
}

/// Loot tables use `{tables: {id: {...}}}` or the id-keyed shapes.
pub fn load_loot_tables(dir: &Path) -> BTreeMap<String, LootTableDef> {
    let Ok(entries) = fs::read_dir(dir) else {
        return BTreeMap::new();
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    let mut out = BTreeMap::new();
    for path in paths {
        if !path.extension().is_some_and(|ext| ext == "json") {
            continue;
        }
        let value = match read_json(&path) {
            Ok(v) => v,
            Err(err) => {
                log::warn!("skipping malformed loot file: {err}");
                continue;
            }
        };
        let tables = value.get("tables").cloned().unwrap_or(value);
        if let Value::Object(map) = tables {
            for (id, table) in map {
                match serde_json::from_value::<LootTableDef>(table) {
                    Ok(parsed) => {
                        out.insert(id, parsed);
                    }
                    Err(err) => log::warn!("skipping malformed loot table '{id}': {err}"),
                }
            }
        }
    }
    out
}

/// Parse a world document into the immutable graph.
pub fn build_world(value: Value) -> Result<World, ContentError> {
    #[derive(serde::Deserialize)]
    struct WorldDoc {
        id: String,
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        macro_rooms: Vec<MacroDoc>,
    }
    #[derive(serde::Deserialize)]
    struct MacroDoc {
        id: String,
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        micro_rooms: Vec<MicroRoom>,
    }

    let doc: WorldDoc = serde_json::from_value(value).map_err(|source| ContentError::Json {
        path: PathBuf::from("<world>"),
        source,
    })?;
    let mut macro_rooms = BTreeMap::new();
    for m in doc.macro_rooms {
        let mut micro_rooms = BTreeMap::new();
        for micro in m.micro_rooms {
            micro_rooms.insert(micro.id.clone(), micro);
        }
        macro_rooms.insert(
            m.id.clone(),
            MacroRoom {
                id: m.id,
                name: m.name,
                description: m.description,
                micro_rooms,
            },
        );
    }
    Ok(World {
        id: doc.id,
        name: doc.name,
        description: doc.description,
        macro_rooms,
    })
}

/// Load and validate a world file.
pub fn load_world(path: &Path) -> Result<World, ContentError> {
    let world = build_world(read_json(path)?)?;
    let issues = validate_world(&world);
    if issues.is_empty() {
        Ok(world)
    } else {
        Err(ContentError::InvalidWorld(issues))
    }
}

/// Structural issues in a world graph, empty when consistent.
pub fn validate_world(world: &World) -> Vec<String> {
    let mut issues = Vec::new();
    let mut seen_micro: BTreeMap<&str, &str> = BTreeMap::new();
    for macro_room in world.macro_rooms.values() {
        for micro_id in macro_room.micro_rooms.keys() {
            if let Some(previous) = seen_micro.insert(micro_id, &macro_room.id) {
                issues.push(format!(
                    "duplicate micro id '{micro_id}' in macro '{}' (already in '{previous}')",
                    macro_room.id
                ));
            }
        }
    }
    for macro_room in world.macro_rooms.values() {
        for micro in macro_room.micro_rooms.values() {
            for exit in &micro.exits {
                if exit.direction.is_empty() {
                    issues.push(format!("micro '{}' has exit with empty direction", micro.id));
                }
                let target_macro = exit.target_macro.as_deref().unwrap_or(&macro_room.id);
                match world.macro_rooms.get(target_macro) {
                    None => issues.push(format!(
                        "exit from '{}' points to missing macro '{target_macro}'",
                        micro.id
                    )),
                    Some(m) if !m.micro_rooms.contains_key(&exit.target_micro) => {
                        issues.push(format!(
                            "exit from '{}' points to missing micro '{}' (macro '{target_macro}')",
                            micro.id, exit.target_micro
                        ))
                    }
                    _ => {}
                }
            }
        }
    }
    issues
}

/// Load the localized string table.
pub fn load_strings(path: &Path) -> Result<Strings, ContentError> {
    let value = read_json(path)?;
    serde_json::from_value(value).map_err(|source| ContentError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_doc() -> Value {
        serde_json::json!({
            "id": "ashfall", "name": "Ashfall", "description": "w",
            "macro_rooms": [{
                "id": "forest", "name": "Foresta", "description": "",
                "micro_rooms": [
                    {"id": "clearing", "name": "Radura", "short": "Radura",
                     "description": "Erba alta.", "tags": [],
                     "exits": [{"direction": "nord", "target_micro": "creek"}],
                     "interactables": [{"id": "cippo"}]},
                    {"id": "creek", "name": "Torrente", "short": "Torrente",
                     "description": "Acqua bassa.",
                     "exits": [{"direction": "sud", "target_micro": "clearing"}]}
                ]
            }]
        })
    }

    #[test]
    fn world_builds_and_validates() {
        let world = build_world(world_doc()).unwrap();
        assert!(validate_world(&world).is_empty());
        let micro = world.find_micro("forest", "clearing").unwrap();
        assert_eq!(micro.exits[0].direction, "nord");
        assert_eq!(micro.interactables[0].id, "cippo");
    }

    #[test]
    fn validation_flags_dangling_exit() {
        let mut doc = world_doc();
        doc["macro_rooms"][0]["micro_rooms"][0]["exits"][0]["target_micro"] =
            Value::String("nowhere".into());
        let world = build_world(doc).unwrap();
        let issues = validate_world(&world);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("missing micro 'nowhere'"));
    }

    #[test]
    fn collect_accepts_all_three_shapes() {
        let mut out = BTreeMap::new();
        collect_identified(serde_json::json!({"id": "a", "hp": 1}), &mut out);
        collect_identified(serde_json::json!([{"id": "b"}, {"id": "c"}]), &mut out);
        collect_identified(
            serde_json::json!({"melee": [{"id": "d"}], "ranged": [{"id": "e"}]}),
            &mut out,
        );
        assert_eq!(
            out.keys().collect::<Vec<_>>(),
            vec!["a", "b", "c", "d", "e"]
        );
    }

    #[test]
    fn duplicate_ids_resolve_last_wins() {
        let mut out = BTreeMap::new();
        collect_identified(serde_json::json!({"id": "a", "hp": 1}), &mut out);
        collect_identified(serde_json::json!({"id": "a", "hp": 9}), &mut out);
        assert_eq!(out["a"]["hp"], 9);
    }

    #[test]
    fn load_typed_dirs_from_tempdir() {
        let dir = std::env::temp_dir().join("ashfall_loader_test");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(
            dir.join("a_knife.json"),
            r#"{"id": "knife", "name": "Coltello", "damage": 3, "tags": ["blade"]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("sub/guns.json"),
            r#"[{"id": "pistol", "damage": 4, "tags": ["ranged"], "clip_size": 12}]"#,
        )
        .unwrap();
        fs::write(dir.join("broken.json"), "{not json").unwrap();

        let weapons = load_weapons(&dir);
        assert!(weapons.contains_key("knife"));
        assert!(weapons.contains_key("pistol"), "scanners recurse");
        assert_eq!(weapons["pistol"].clip_size, 12);

        let _ = fs::remove_dir_all(&dir);
    }
}
