//! Presented choices: registered scenarios whose options are filtered
//! by flags and whose consequences write back into the game state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ashfall_core::errors::ActionError;
use ashfall_core::events::TimelineEvent;
use ashfall_core::state::{ChoiceRecord, FlagValue, GameState};

/// What picking an option does.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Consequences {
    pub flags: BTreeMap<String, FlagValue>,
    /// Skill/stat increments.
    pub skills: BTreeMap<String, i64>,
    /// A memory line recorded on the timeline.
    pub memory: Option<String>,
    /// Relationship increments keyed by npc id.
    pub relationship: BTreeMap<String, i64>,
}

/// One selectable option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub description: String,
    /// Flags that must all be truthy for the option to appear.
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Flags that hide the option when truthy.
    #[serde(default)]
    pub forbidden: Vec<String>,
    #[serde(default)]
    pub consequences: Consequences,
}

/// A registered choice scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub repeatable: bool,
}

/// Registered scenarios plus presentation/selection logic. History
/// lives on the game state so it persists in snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceSystem {
    pub choices: BTreeMap<String, Choice>,
}

impl ChoiceSystem {
    pub fn register(&mut self, choice: Choice) {
        self.choices.insert(choice.id.clone(), choice);
    }

    /// Parse `{choices: [...]}`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(default)]
            choices: Vec<Choice>,
        }
        let doc: Doc = serde_json::from_value(value)?;
        Ok(Self {
            choices: doc.choices.into_iter().map(|c| (c.id.clone(), c)).collect(),
        })
    }

    fn option_available(option: &ChoiceOption, state: &GameState) -> bool {
        option.requirements.iter().all(|f| state.flag_truthy(f))
            && !option.forbidden.iter().any(|f| state.flag_truthy(f))
    }

    /// Available options of a scenario, in declaration order. Fails for
    /// unknown scenarios and for one-shot scenarios already taken.
    pub fn present<'a>(
        &'a self,
        choice_id: &str,
        state: &GameState,
    ) -> Result<Vec<&'a ChoiceOption>, ActionError> {
        let choice = self
            .choices
            .get(choice_id)
            .ok_or_else(|| ActionError::not_found(format!("Scelta sconosciuta: {choice_id}")))?;
        if !choice.repeatable && state.choices_made.contains(choice_id) {
            return Err(ActionError::precondition("Hai già preso questa decisione."));
        }
        Ok(choice
            .options
            .iter()
            .filter(|o| Self::option_available(o, state))
            .collect())
    }

    /// Make a choice: apply consequences and record it in history.
    pub fn make(
        &self,
        choice_id: &str,
        option_id: &str,
        state: &mut GameState,
    ) -> Result<Vec<String>, ActionError> {
        let option = self
            .present(choice_id, state)?
            .into_iter()
            .find(|o| o.id == option_id)
            .cloned()
            .ok_or_else(|| {
                ActionError::invalid(format!("Opzione non disponibile: {option_id}"))
            })?;

        let mut lines = vec![option.text.clone()];
        for (key, value) in &option.consequences.flags {
            state.flags.insert(key.clone(), value.clone());
        }
        for (skill, delta) in &option.consequences.skills {
            state.stats.add(skill, *delta);
        }
        for (npc, delta) in &option.consequences.relationship {
            *state.relationships.entry(npc.clone()).or_insert(0) += delta;
        }
        if let Some(memory) = &option.consequences.memory {
            state.timeline.push(TimelineEvent::Event {
                text: memory.clone(),
                timestamp: state.clock.time_minutes,
                day: state.clock.day_count,
                location: state.location_key(),
            });
            lines.push(memory.clone());
        }
        state.choices_made.insert(choice_id.to_string());
        state.choice_history.push(ChoiceRecord {
            choice_id: choice_id.to_string(),
            option_id: option_id.to_string(),
            total_minutes: state.total_minutes(),
        });
        Ok(lines)
    }
}
