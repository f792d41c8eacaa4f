//! Versioned save snapshots.
//!
//! A snapshot is one JSON file holding the full game state plus quest
//! progress. Slot files are stamped with epoch seconds
//! (`<slot>_<secs>.json`); loading picks the newest file for a slot.
//! Files from a newer engine version are rejected, corrupt files are
//! skipped while listing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ashfall_core::errors::ActionError;
use ashfall_core::state::GameState;
use ashfall_quest::QuestLog;

/// Current snapshot format version. Bump on breaking changes.
pub const SAVE_VERSION: u32 = 1;

/// The on-disk snapshot record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Wall-clock epoch seconds at save time.
    pub timestamp: u64,
    pub state: GameState,
    pub quests: QuestLog,
}

/// Lightweight listing entry, readable without replaying the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub slot: String,
    pub path: PathBuf,
    pub timestamp: u64,
    pub version: u32,
    pub location: String,
    pub day_count: i64,
    pub time_minutes: i64,
}

fn slot_of(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (slot, stamp) = stem.rsplit_once('_')?;
    stamp.parse::<u64>().ok()?;
    Some(slot.to_string())
}

/// Write a snapshot into `dir` under the given slot.
pub fn save_game(
    dir: &Path,
    slot: &str,
    state: &GameState,
    quests: &QuestLog,
    now_ts: u64,
) -> Result<PathBuf, ActionError> {
    if slot.is_empty() || slot.contains(['/', '\\', '.']) {
        return Err(ActionError::invalid(format!("Nome slot non valido: {slot}")));
    }
    fs::create_dir_all(dir)
        .map_err(|e| ActionError::Transient(format!("impossibile creare la cartella: {e}")))?;
    let snapshot = Snapshot {
        version: SAVE_VERSION,
        timestamp: now_ts,
        state: state.clone(),
        quests: quests.clone(),
    };
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| ActionError::Transient(format!("serializzazione fallita: {e}")))?;
    let path = dir.join(format!("{slot}_{now_ts}.json"));
    fs::write(&path, json)
        .map_err(|e| ActionError::Transient(format!("scrittura fallita: {e}")))?;
    Ok(path)
}

fn read_snapshot(path: &Path) -> Result<Snapshot, ActionError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| ActionError::Transient(format!("lettura fallita: {e}")))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .map_err(|e| ActionError::Transient(format!("salvataggio corrotto: {e}")))?;
    if snapshot.version > SAVE_VERSION {
        return Err(ActionError::conflict(format!(
            "Salvataggio di una versione più recente ({} > {SAVE_VERSION}).",
            snapshot.version
        )));
    }
    Ok(snapshot)
}

/// Load the newest snapshot of a slot.
pub fn load_game(dir: &Path, slot: &str) -> Result<Snapshot, ActionError> {
    let entries = fs::read_dir(dir)
        .map_err(|_| ActionError::not_found(format!("Nessun salvataggio per '{slot}'.")))?;
    let mut newest: Option<PathBuf> = None;
    let mut newest_stamp = 0u64;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        if slot_of(&path).as_deref() != Some(slot) {
            continue;
        }
        let stamp = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.rsplit_once('_'))
            .and_then(|(_, stamp)| stamp.parse::<u64>().ok())
            .unwrap_or(0);
        if newest.is_none() || stamp > newest_stamp {
            newest = Some(path);
            newest_stamp = stamp;
        }
    }
    let path =
        newest.ok_or_else(|| ActionError::not_found(format!("Nessun salvataggio per '{slot}'.")))?;
    read_snapshot(&path)
}

/// List every save in the directory, newest first. Corrupt files are
/// skipped with a warning.
pub fn list_saves(dir: &Path) -> Vec<SaveMetadata> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut saves = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Some(slot) = slot_of(&path) else {
            continue;
        };
        match read_snapshot(&path) {
            Ok(snapshot) => saves.push(SaveMetadata {
                slot,
                path,
                timestamp: snapshot.timestamp,
                version: snapshot.version,
                location: snapshot.state.location_key(),
                day_count: snapshot.state.clock.day_count,
                time_minutes: snapshot.state.clock.time_minutes,
            }),
            Err(err) => log::warn!("skipping unreadable save {path:?}: {err}"),
        }
    }
    saves.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    saves
}

/// Delete every save file of a slot. Missing slots are a no-op.
pub fn delete_save(dir: &Path, slot: &str) -> Result<usize, ActionError> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(0);
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if slot_of(&path).as_deref() == Some(slot) {
            fs::remove_file(&path)
                .map_err(|e| ActionError::Transient(format!("cancellazione fallita: {e}")))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashfall_quest::{Quest, QuestPriority};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ashfall_save_{name}"));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn sample_state() -> GameState {
        let mut state = GameState::new("w", "forest", "clearing");
        state.clock.recompute(1_700_000_000.0);
        state.set_flag("met_ranger", true);
        state.visited_micro.insert("clearing".into());
        state.legacy_inventory.push("bandage".into());
        state
    }

    fn sample_quests() -> QuestLog {
        let mut log = QuestLog::default();
        let mut quest = Quest::new("q1", "Prima luce");
        quest.priority = QuestPriority::Side;
        log.register(quest);
        log
    }

    #[test]
    fn snapshot_roundtrip_preserves_state() {
        let dir = temp_dir("roundtrip");
        let state = sample_state();
        let quests = sample_quests();
        save_game(&dir, "slot1", &state, &quests, 1000).unwrap();

        let snapshot = load_game(&dir, "slot1").unwrap();
        assert_eq!(snapshot.version, SAVE_VERSION);
        assert_eq!(snapshot.state.location_key(), "forest:clearing");
        assert!(snapshot.state.flag_truthy("met_ranger"));
        assert!(snapshot.state.visited_micro.contains("clearing"));
        assert!(snapshot.quests.quests.contains_key("q1"));
        assert_eq!(
            serde_json::to_string(&snapshot.state).unwrap(),
            serde_json::to_string(&state).unwrap()
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_picks_newest_stamp() {
        let dir = temp_dir("newest");
        let mut state = sample_state();
        let quests = sample_quests();
        save_game(&dir, "slot1", &state, &quests, 1000).unwrap();
        state.set_flag("later", true);
        save_game(&dir, "slot1", &state, &quests, 2000).unwrap();

        let snapshot = load_game(&dir, "slot1").unwrap();
        assert!(snapshot.state.flag_truthy("later"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn newer_version_is_rejected() {
        let dir = temp_dir("version");
        let state = sample_state();
        let quests = sample_quests();
        let path = save_game(&dir, "slot1", &state, &quests, 1000).unwrap();
        let mut raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw["version"] = serde_json::json!(SAVE_VERSION + 1);
        fs::write(&path, raw.to_string()).unwrap();

        let err = load_game(&dir, "slot1").unwrap_err();
        assert!(matches!(err, ActionError::ConflictState(_)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn listing_skips_corrupt_files() {
        let dir = temp_dir("listing");
        let state = sample_state();
        let quests = sample_quests();
        save_game(&dir, "alpha", &state, &quests, 1000).unwrap();
        save_game(&dir, "beta", &state, &quests, 2000).unwrap();
        fs::write(dir.join("broken_3000.json"), "{not json").unwrap();

        let saves = list_saves(&dir);
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].slot, "beta");
        assert_eq!(saves[1].slot, "alpha");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn delete_save_removes_all_slot_files() {
        let dir = temp_dir("delete");
        let state = sample_state();
        let quests = sample_quests();
        save_game(&dir, "slot1", &state, &quests, 1000).unwrap();
        save_game(&dir, "slot1", &state, &quests, 2000).unwrap();
        assert_eq!(delete_save(&dir, "slot1").unwrap(), 2);
        assert!(load_game(&dir, "slot1").is_err());
        assert_eq!(delete_save(&dir, "slot1").unwrap(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_slot_names_rejected() {
        let dir = temp_dir("badslot");
        let state = sample_state();
        let quests = sample_quests();
        assert!(save_game(&dir, "../evil", &state, &quests, 1).is_err());
        assert!(save_game(&dir, "", &state, &quests, 1).is_err());
    }
}
