//! Story and template loaders.
//!
//! The main story file groups quests into acts:
//! `{acts: [{id, title, quests: [Quest]}]}`. Templates come as
//! `{templates: [QuestTemplate]}`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::generator::QuestTemplate;
use crate::model::Quest;

#[derive(Debug, Error)]
pub enum QuestLoadError {
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
}

#[derive(Debug, Deserialize)]
struct StoryDoc {
    #[serde(default)]
    acts: Vec<ActDoc>,
}

#[derive(Debug, Deserialize)]
struct ActDoc {
    id: String,
    #[allow(dead_code)]
    #[serde(default)]
    title: String,
    #[serde(default)]
    quests: Vec<Quest>,
}

/// Parse the main story document into quests, stamping each with its
/// act id.
pub fn parse_main_story(value: serde_json::Value) -> Result<Vec<Quest>, serde_json::Error> {
    let doc: StoryDoc = serde_json::from_value(value)?;
    let mut quests = Vec::new();
    for act in doc.acts {
        for mut quest in act.quests {
            quest.act = Some(act.id.clone());
            quests.push(quest);
        }
    }
    Ok(quests)
}

/// Load the main story from disk.
pub fn load_main_story(path: &Path) -> Result<Vec<Quest>, QuestLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| QuestLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| QuestLoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    parse_main_story(value).map_err(|source| QuestLoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct TemplatesDoc {
    #[serde(default)]
    templates: Vec<QuestTemplate>,
}

/// Parse a quest templates document.
pub fn parse_templates(value: serde_json::Value) -> Result<Vec<QuestTemplate>, serde_json::Error> {
    let doc: TemplatesDoc = serde_json::from_value(value)?;
    Ok(doc.templates)
}

/// Load quest templates from disk. A missing file is an empty template
/// list, not an error.
pub fn load_templates(path: &Path) -> Result<Vec<QuestTemplate>, QuestLoadError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).map_err(|source| QuestLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| QuestLoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    parse_templates(value).map_err(|source| QuestLoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}
