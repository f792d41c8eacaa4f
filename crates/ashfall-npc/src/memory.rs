//! Per-NPC memory store: append-only JSONL files with keyword-scored
//! retrieval.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::schema::MemoryWrite;

/// File-backed memory store rooted at a directory; one
/// `<npc_id>.jsonl` per NPC.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    base: PathBuf,
}

impl MemoryStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn file_of(&self, npc_id: &str) -> PathBuf {
        self.base.join(format!("{npc_id}.jsonl"))
    }

    /// Append memory records, one JSON object per line. Records without
    /// a timestamp get stamped with `now_ts`.
    pub fn write(&self, npc_id: &str, items: &[MemoryWrite], now_ts: i64) -> std::io::Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.base)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_of(npc_id))?;
        for item in items {
            let mut stamped = item.clone();
            if stamped.timestamp.is_none() {
                stamped.timestamp = Some(now_ts);
            }
            let line = serde_json::to_string(&stamped)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Retrieve the most relevant memories: records scored by the sum
    /// of case-insensitive occurrences of each query term over
    /// `key + value`; top `limit` with positive score.
    pub fn retrieve(&self, npc_id: &str, query_terms: &[&str], limit: usize) -> Vec<MemoryWrite> {
        let path = self.file_of(npc_id);
        let Ok(raw) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        let mut scored: Vec<(usize, MemoryWrite)> = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(record) = serde_json::from_str::<MemoryWrite>(line) else {
                log::warn!("skipping corrupt memory line for npc '{npc_id}'");
                continue;
            };
            let text = format!("{} {}", record.key, record.value).to_lowercase();
            let score: usize = query_terms
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| text.matches(&t.to_lowercase()).count())
                .sum();
            scored.push((score, record));
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .filter(|(score, _)| *score > 0)
            .take(limit)
            .map(|(_, record)| record)
            .collect()
    }

    pub fn count(&self, npc_id: &str) -> usize {
        fs::read_to_string(self.file_of(npc_id))
            .map(|raw| raw.lines().filter(|l| !l.trim().is_empty()).count())
            .unwrap_or(0)
    }

    /// Drop every memory for an NPC.
    pub fn clear(&self, npc_id: &str) -> std::io::Result<()> {
        let path = self.file_of(npc_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }
}
