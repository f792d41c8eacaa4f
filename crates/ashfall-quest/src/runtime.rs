//! Quest log runtime: registration, tracking, and the progression
//! tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ashfall_core::state::GameState;
use ashfall_content::ContentRegistry;

use crate::fsm;
use crate::model::{Quest, QuestPriority, QuestState};

/// The player's quest log. Serialized beside the game state in save
/// snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestLog {
    pub quests: BTreeMap<String, Quest>,
    pub tracked_quest_id: Option<String>,
}

impl QuestLog {
    pub fn register(&mut self, quest: Quest) {
        self.quests.insert(quest.id.clone(), quest);
    }

    pub fn get(&self, quest_id: &str) -> Option<&Quest> {
        self.quests.get(quest_id)
    }

    pub fn start(&mut self, quest_id: &str, state: &mut GameState) -> bool {
        match self.quests.get_mut(quest_id) {
            Some(quest) => fsm::start_quest(quest, state),
            None => false,
        }
    }

    /// Abandon a side quest; main quests refuse.
    pub fn abandon(&mut self, quest_id: &str) -> bool {
        match self.quests.get_mut(quest_id) {
            Some(quest) => {
                let abandoned = fsm::abandon(quest);
                if abandoned && self.tracked_quest_id.as_deref() == Some(quest_id) {
                    self.tracked_quest_id = None;
                }
                abandoned
            }
            None => false,
        }
    }

    /// Track an active quest for the journal header.
    pub fn track(&mut self, quest_id: &str) -> bool {
        let trackable = self
            .quests
            .get(quest_id)
            .is_some_and(|q| q.state.is_active());
        if trackable {
            self.tracked_quest_id = Some(quest_id.to_string());
        }
        trackable
    }

    pub fn untrack(&mut self) {
        self.tracked_quest_id = None;
    }

    pub fn tracked(&self) -> Option<&Quest> {
        self.tracked_quest_id
            .as_deref()
            .and_then(|id| self.quests.get(id))
    }

    pub fn active(&self) -> impl Iterator<Item = &Quest> {
        self.quests.values().filter(|q| q.state.is_active())
    }

    pub fn by_priority(&self, priority: QuestPriority) -> Vec<&Quest> {
        self.quests
            .values()
            .filter(|q| q.priority == priority)
            .collect()
    }

    pub fn completed(&self) -> Vec<&Quest> {
        self.quests
            .values()
            .filter(|q| q.state == QuestState::Completed)
            .collect()
    }

    /// Progression tick over every active quest, in the contract order:
    /// fail → unblock → advance. Returns user-facing messages.
    pub fn tick(&mut self, state: &mut GameState, registry: &ContentRegistry) -> Vec<String> {
        let mut messages = Vec::new();
        for quest in self.quests.values_mut() {
            if !quest.state.is_active() {
                continue;
            }
            if fsm::fail_if_needed(quest, state, registry) {
                messages.push(format!("*** Quest FALLITA: {} ***", quest.title));
                continue;
            }
            if quest.state == QuestState::Blocked {
                if fsm::unblock_if_possible(quest, state) {
                    if let Some(step) = quest.current_step() {
                        messages.push(format!(">> {}: {}", quest.title, step.title));
                    }
                }
                continue;
            }
            let old_index = quest.current_step_index;
            fsm::advance(quest, state, registry);
            if quest.state == QuestState::Completed {
                messages.push(format!("*** Quest COMPLETATA: {} ***", quest.title));
            } else if quest.current_step_index > old_index {
                if let Some(step) = quest.current_step() {
                    messages.push(format!(">> {}: {}", quest.title, step.title));
                }
            } else if quest.state == QuestState::Blocked {
                messages.push(format!(
                    ">> {}: Bloccata - requisiti non soddisfatti",
                    quest.title
                ));
            }
        }
        messages
    }

    /// Formatted journal listing, main quests before side quests.
    pub fn journal_lines(&self) -> Vec<String> {
        let active: Vec<&Quest> = self.active().collect();
        if active.is_empty() {
            return vec!["Nessuna missione attiva.".to_string()];
        }
        let mut lines = vec!["=== Diario delle Missioni ===".to_string()];
        let mains: Vec<&&Quest> = active
            .iter()
            .filter(|q| q.priority == QuestPriority::Main)
            .collect();
        let sides: Vec<&&Quest> = active
            .iter()
            .filter(|q| q.priority == QuestPriority::Side)
            .collect();
        if !mains.is_empty() {
            lines.push("-- Missioni Principali --".to_string());
            for quest in mains {
                self.push_entry(quest, &mut lines);
            }
        }
        if !sides.is_empty() {
            lines.push("-- Missioni Secondarie --".to_string());
            for quest in sides {
                self.push_entry(quest, &mut lines);
            }
        }
        lines
    }

    fn push_entry(&self, quest: &Quest, lines: &mut Vec<String>) {
        let marker = if self.tracked_quest_id.as_deref() == Some(&quest.id) {
            "*"
        } else {
            " "
        };
        lines.push(format!("{marker} {}", quest.title));
        if let Some(act) = &quest.act {
            lines.push(format!("   Atto: {act}"));
        }
        if let Some(step) = quest.current_step() {
            if quest.state == QuestState::Blocked {
                lines.push(format!("   [BLOCCATA] {}", step.title));
            } else {
                lines.push(format!("   Obiettivo: {}", step.description));
            }
        }
        lines.push(format!(
            "   Progresso: {}/{}",
            quest.current_step_index + 1,
            quest.steps.len()
        ));
    }
}
