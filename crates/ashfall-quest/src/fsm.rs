//! Quest state machine.
//!
//! Transitions are one-way per step: forward through steps, failure and
//! completion terminal, abandonment legal only for side quests.

use ashfall_core::state::GameState;
use ashfall_content::ContentRegistry;

use crate::dsl::{check, check_all};
use crate::model::{Quest, QuestPriority, QuestState, Reward};

pub fn can_start(quest: &Quest, state: &GameState) -> bool {
    quest.state == QuestState::NotStarted && check_all(&quest.prerequisites, state)
}

/// Start a quest: `not_started` → `in_progress`, or `blocked` when the
/// first step's enter conditions do not hold yet.
pub fn start_quest(quest: &mut Quest, state: &mut GameState) -> bool {
    if !can_start(quest, state) {
        return false;
    }
    quest.state = QuestState::InProgress;
    quest.current_step_index = 0;
    if let Some(step) = quest.current_step() {
        if check_all(&step.enter_conditions, state) {
            let flags = step.on_enter_flags.clone();
            for (key, value) in flags {
                state.flags.insert(key, value);
            }
        } else {
            quest.state = QuestState::Blocked;
        }
    }
    true
}

pub fn can_advance(quest: &Quest, state: &GameState) -> bool {
    if quest.state != QuestState::InProgress {
        return false;
    }
    match quest.current_step() {
        Some(step) => check_all(&step.complete_conditions, state),
        None => false,
    }
}

/// Advance one step if its completion conditions hold. Applies
/// on-complete flags, then either completes the quest, enters the next
/// step, or blocks on its enter conditions (without applying its
/// flags).
pub fn advance(quest: &mut Quest, state: &mut GameState, registry: &ContentRegistry) {
    if !can_advance(quest, state) {
        return;
    }
    if let Some(step) = quest.current_step() {
        let flags = step.on_complete_flags.clone();
        for (key, value) in flags {
            state.flags.insert(key, value);
        }
    }
    quest.current_step_index += 1;
    if quest.current_step_index >= quest.steps.len() {
        quest.state = QuestState::Completed;
        apply_rewards(&quest.rewards_on_complete, state, registry);
        return;
    }
    if let Some(next) = quest.current_step() {
        if check_all(&next.enter_conditions, state) {
            let flags = next.on_enter_flags.clone();
            for (key, value) in flags {
                state.flags.insert(key, value);
            }
        } else {
            quest.state = QuestState::Blocked;
        }
    }
}

/// Fail the quest if any fail condition holds. Terminal.
pub fn fail_if_needed(
    quest: &mut Quest,
    state: &mut GameState,
    registry: &ContentRegistry,
) -> bool {
    if quest.state.is_terminal() || quest.state == QuestState::NotStarted {
        return false;
    }
    if quest.fail_conditions.iter().any(|c| check(c, state)) {
        quest.state = QuestState::Failed;
        apply_rewards(&quest.rewards_on_fail, state, registry);
        return true;
    }
    false
}

/// `blocked` → `in_progress` once the current step's enter conditions
/// hold; its on-enter flags apply then.
pub fn unblock_if_possible(quest: &mut Quest, state: &mut GameState) -> bool {
    if quest.state != QuestState::Blocked {
        return false;
    }
    let Some(step) = quest.current_step() else {
        return false;
    };
    if !check_all(&step.enter_conditions, state) {
        return false;
    }
    let flags = step.on_enter_flags.clone();
    for (key, value) in flags {
        state.flags.insert(key, value);
    }
    quest.state = QuestState::InProgress;
    true
}

/// Abandon a side quest in an active state. Main quests cannot be
/// abandoned.
pub fn abandon(quest: &mut Quest) -> bool {
    if quest.priority == QuestPriority::Main || !quest.state.is_active() {
        return false;
    }
    quest.state = QuestState::Abandoned;
    true
}

/// Apply a reward bundle: items through the stacking inventory, stat
/// and relationship increments, flags verbatim.
pub fn apply_rewards(reward: &Reward, state: &mut GameState, registry: &ContentRegistry) {
    for item in &reward.items {
        let rules = registry.stack_rules(&item.id);
        if let Err(err) = state.inventory.add(&item.id, item.qty, rules) {
            log::warn!("reward item '{}' not granted: {err}", item.id);
        }
    }
    for (stat, bonus) in &reward.stats {
        state.stats.add(stat, *bonus);
    }
    for (key, bonus) in &reward.relation {
        *state.relationships.entry(key.clone()).or_insert(0) += bonus;
    }
    for (key, value) in &reward.flags {
        state.flags.insert(key.clone(), value.clone());
    }
}
