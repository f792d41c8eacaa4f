//! The engine: owns the game state and every subsystem, and enforces
//! the action ordering contract.
//!
//! Within one action, effects apply in this order: clock recompute →
//! realtime combat processing → action body → post-action combat tick →
//! quest/event/ambient polling. The timeline order equals mutation
//! order. All core mutation runs on the caller thread; a front end
//! driving `tick` from a timer must serialize access with one mutex.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ashfall_core::action::ActionResult;
use ashfall_core::config::EngineConfig;
use ashfall_core::errors::ActionError;
use ashfall_core::state::GameState;
use ashfall_combat::{commands as combat_commands, realtime, session};
use ashfall_content::ContentRegistry;
use ashfall_events::{AmbientEventSystem, ChoiceSystem, EventSystem};
use ashfall_npc::{adapter, MemoryStore, NpcProfile, Oracle, SceneContext};
use ashfall_quest::generator::QuestTemplate;
use ashfall_quest::{journal, QuestLog, QuestPriority, QuestState};

use crate::explore::{self, InteractionTier};
use crate::items;
use crate::persistence::{self, SaveMetadata, Snapshot};

/// Everything needed to run a game.
pub struct Engine {
    pub registry: Arc<ContentRegistry>,
    pub config: EngineConfig,
    pub state: GameState,
    pub quests: QuestLog,
    pub events: EventSystem,
    pub ambient_events: AmbientEventSystem,
    pub choices: ChoiceSystem,
    pub quest_templates: Vec<QuestTemplate>,
    /// NPC display names for journal `{npc:id}` placeholders.
    pub npc_names: BTreeMap<String, String>,
    pub memory_store: MemoryStore,
    pub saves_dir: PathBuf,
    rng: ChaCha8Rng,
}

impl Engine {
    /// Build an engine with a seeded RNG. The seed is recorded on the
    /// state for reproduction.
    pub fn new(
        registry: Arc<ContentRegistry>,
        config: EngineConfig,
        state: GameState,
        seed: u64,
    ) -> Self {
        let mut state = state;
        state.rng_seed = seed;
        state.ambient_min_gap_minutes = config.ambient_min_gap_minutes;
        state.clock.time_scale = config.time_scale;
        Self {
            registry,
            config,
            state,
            quests: QuestLog::default(),
            events: EventSystem::default(),
            ambient_events: AmbientEventSystem::default(),
            choices: ChoiceSystem::default(),
            quest_templates: Vec::new(),
            npc_names: BTreeMap::new(),
            memory_store: MemoryStore::new("data/npc_memories"),
            saves_dir: PathBuf::from("data/saves"),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Engine with a process-entropy seed.
    pub fn with_default_seed(
        registry: Arc<ContentRegistry>,
        config: EngineConfig,
        state: GameState,
    ) -> Self {
        let seed = rand::rngs::OsRng.next_u64();
        Self::new(registry, config, state, seed)
    }

    fn wall_now() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Clock recompute plus weather and pending combat deadlines.
    /// Runs before every action body.
    fn pre_action(&mut self, now: f64) -> Vec<String> {
        let total = self.state.clock.recompute(now);
        self.state
            .clock
            .advance_weather_if_due(total, &mut self.rng);
        realtime::tick_combat(
            &mut self.state,
            &self.registry,
            &self.config,
            now,
            &mut self.rng,
        )
    }

    /// Quest progression, ambient events, buffered messages. Runs after
    /// every action body.
    fn post_action(&mut self) -> Vec<String> {
        let mut lines = self.quests.tick(&mut self.state, &self.registry);
        if let Some(ambient) = self.ambient_events.poll(&mut self.state, &mut self.rng) {
            lines.push(ambient);
        }
        lines.extend(self.state.pending_messages.drain(..));
        lines
    }

    fn run<F>(&mut self, body: F) -> Result<ActionResult, ActionError>
    where
        F: FnOnce(&mut Self, f64) -> Result<ActionResult, ActionError>,
    {
        let now = Self::wall_now();
        let pre_lines = self.pre_action(now);
        let mut result = body(self, now)?;
        let post_lines = self.post_action();
        let mut lines = pre_lines;
        lines.append(&mut result.lines);
        lines.extend(post_lines);
        result.lines = lines;
        Ok(result)
    }

    // --- Exploration ---

    pub fn look(&mut self) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| explore::look(&mut engine.state, &engine.registry, &mut engine.rng))
    }

    pub fn go(&mut self, direction: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| {
            explore::go(
                &mut engine.state,
                &engine.registry,
                &engine.events,
                direction,
                &mut engine.rng,
            )
        })
    }

    pub fn wait(&mut self, minutes: i64) -> Result<ActionResult, ActionError> {
        self.run(|engine, now| {
            explore::wait(&mut engine.state, &engine.registry, minutes, now, &mut engine.rng)
        })
    }

    pub fn wait_until(&mut self, phase: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, now| {
            explore::wait_until(&mut engine.state, &engine.registry, phase, now, &mut engine.rng)
        })
    }

    pub fn where_am_i(&mut self) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| explore::where_am_i(&engine.state, &engine.registry))
    }

    pub fn status(&mut self) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| Ok(explore::player_status(&engine.state, &engine.registry)))
    }

    pub fn inspect(&mut self, name: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| {
            explore::interact(
                &mut engine.state,
                &engine.registry,
                InteractionTier::Inspect,
                name,
            )
        })
    }

    pub fn examine(&mut self, name: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| {
            explore::interact(
                &mut engine.state,
                &engine.registry,
                InteractionTier::Examine,
                name,
            )
        })
    }

    pub fn search(&mut self, name: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| {
            explore::interact(
                &mut engine.state,
                &engine.registry,
                InteractionTier::Search,
                name,
            )
        })
    }

    // --- Inventory ---

    pub fn inventory(&mut self) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| Ok(items::inventory(&engine.state, &engine.registry)))
    }

    pub fn stats(&mut self) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| Ok(items::stats(&engine.state)))
    }

    pub fn use_item(&mut self, name: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| items::use_item(&mut engine.state, &engine.registry, name))
    }

    pub fn equip_item(&mut self, name: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| items::equip_item(&mut engine.state, &engine.registry, name))
    }

    pub fn unequip_item(&mut self, slot_or_name: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| items::unequip_item(&mut engine.state, &engine.registry, slot_or_name))
    }

    pub fn drop_item(&mut self, name: &str, qty: u32) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| items::drop_item(&mut engine.state, &engine.registry, name, qty))
    }

    pub fn examine_item(&mut self, name: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, _| items::examine_item(&engine.state, &engine.registry, name))
    }

    // --- Combat ---

    /// Engage a mob from the content registry.
    pub fn engage(&mut self, enemy_id: &str) -> Result<ActionResult, ActionError> {
        self.run(|engine, now| {
            let mob = engine
                .registry
                .mob(enemy_id)
                .ok_or_else(|| ActionError::not_found(format!("Nemico sconosciuto: {enemy_id}")))?
                .clone();
            session::start_combat(&mut engine.state, &mob, &engine.config, now)
        })
    }

    /// Add enemies to the running session.
    pub fn spawn(&mut self, enemy_id: &str, count: u32) -> Result<ActionResult, ActionError> {
        self.run(|engine, now| {
            let mob = engine
                .registry
                .mob(enemy_id)
                .ok_or_else(|| ActionError::not_found(format!("Nemico sconosciuto: {enemy_id}")))?
                .clone();
            session::spawn_enemies(&mut engine.state, &mob, count, now, &mut engine.rng)
        })
    }

    /// Dispatch a combat command (`attack`, `qte <token>`, ...).
    pub fn combat_action(
        &mut self,
        command: &str,
        arg: Option<&str>,
    ) -> Result<ActionResult, ActionError> {
        self.run(|engine, now| {
            combat_commands::resolve_combat_action(
                &mut engine.state,
                &engine.registry,
                &engine.config,
                command,
                arg,
                now,
                &mut engine.rng,
            )
        })
    }

    /// Realtime poll for the front end: narrated combat events plus
    /// quest/ambient fallout. Idempotent for a fixed wall instant.
    pub fn tick(&mut self) -> Vec<String> {
        let now = Self::wall_now();
        let mut lines = self.pre_action(now);
        lines.extend(self.post_action());
        lines
    }

    // --- Quests ---

    /// Register the main story and generate procedural side quests.
    pub fn register_quests(&mut self, quests: Vec<ashfall_quest::Quest>) {
        for quest in quests {
            self.quests.register(quest);
        }
    }

    /// Draw side quests from the loaded templates.
    pub fn generate_side_quests(&mut self, max_quests: usize) -> Vec<String> {
        let generated = ashfall_quest::generator::generate_side_quests(
            &self.quest_templates,
            &self.state,
            max_quests,
            &mut self.rng,
        );
        let mut ids = Vec::new();
        for quest in generated {
            ids.push(quest.id.clone());
            self.quests.register(quest);
        }
        ids
    }

    /// List quests, optionally filtered by priority.
    pub fn quest_list(&self, priority: Option<QuestPriority>) -> ActionResult {
        let quests: Vec<&ashfall_quest::Quest> = match priority {
            Some(p) => self.quests.by_priority(p),
            None => self.quests.quests.values().collect(),
        };
        if quests.is_empty() {
            return ActionResult::line("Nessuna missione.");
        }
        let mut lines = Vec::new();
        for quest in quests {
            lines.push(format!("{} [{:?}] — {:?}", quest.title, quest.priority, quest.state));
        }
        ActionResult::from_lines(lines)
    }

    /// Detail view of one quest.
    pub fn quest_detail(&self, quest_id: &str) -> Result<ActionResult, ActionError> {
        let quest = self
            .quests
            .get(quest_id)
            .ok_or_else(|| ActionError::not_found(format!("Missione sconosciuta: {quest_id}")))?;
        let mut lines = vec![format!("{} — {:?}", quest.title, quest.state)];
        if let Some(step) = quest.current_step() {
            lines.push(format!("Obiettivo: {}", step.description));
        }
        lines.push(format!(
            "Progresso: {}/{}",
            quest.current_step_index + 1,
            quest.steps.len()
        ));
        Ok(ActionResult::from_lines(lines))
    }

    pub fn start_quest(&mut self, quest_id: &str) -> Result<ActionResult, ActionError> {
        if !self.quests.start(quest_id, &mut self.state) {
            return Err(ActionError::precondition(format!(
                "Impossibile avviare la missione {quest_id}."
            )));
        }
        let mut lines = vec![format!("Missione avviata: {quest_id}")];
        if let Some(quest) = self.quests.get(quest_id) {
            if quest.state == QuestState::InProgress {
                if let Some(step) = quest.current_step() {
                    let key = journal::node_key(quest_id, &step.id, "default");
                    if quest.journal_nodes.contains_key(&key) {
                        let quest = quest.clone();
                        lines.push(journal::emit(
                            &quest,
                            &key,
                            &BTreeMap::new(),
                            &self.npc_names,
                            &mut self.state,
                        ));
                    }
                }
            }
        }
        Ok(ActionResult::from_lines(lines))
    }

    pub fn track_quest(&mut self, quest_id: &str) -> Result<ActionResult, ActionError> {
        if self.quests.track(quest_id) {
            Ok(ActionResult::line(format!("Ora segui: {quest_id}")))
        } else {
            Err(ActionError::precondition(format!(
                "Non puoi seguire {quest_id}."
            )))
        }
    }

    pub fn abandon_quest(&mut self, quest_id: &str) -> Result<ActionResult, ActionError> {
        if self.quests.abandon(quest_id) {
            Ok(ActionResult::line(format!("Abbandoni: {quest_id}")))
        } else {
            Err(ActionError::precondition(format!(
                "Non puoi abbandonare {quest_id}."
            )))
        }
    }

    pub fn journal(&self) -> ActionResult {
        ActionResult::from_lines(self.quests.journal_lines())
    }

    // --- Choices ---

    pub fn present_choice(&self, choice_id: &str) -> Result<ActionResult, ActionError> {
        let options = self.choices.present(choice_id, &self.state)?;
        let lines = options
            .iter()
            .map(|o| format!("{}: {}", o.id, o.text))
            .collect();
        Ok(ActionResult::from_lines(lines))
    }

    pub fn make_choice(
        &mut self,
        choice_id: &str,
        option_id: &str,
    ) -> Result<ActionResult, ActionError> {
        let lines = self.choices.make(choice_id, option_id, &mut self.state)?;
        let mut result = ActionResult::from_lines(lines);
        result.lines.extend(self.post_action());
        Ok(result)
    }

    // --- NPC dialogue ---

    /// One dialogue turn against the configured oracle. Never errors:
    /// invalid replies degrade to the neutral fallback.
    pub fn talk(&mut self, oracle: &dyn Oracle, npc: &NpcProfile, player_line: &str) -> ActionResult {
        let context = SceneContext {
            place: self.state.current_micro.clone(),
            weather: self.state.clock.weather.as_str().to_string(),
            daytime: self.state.clock.daytime.as_str().to_string(),
            player_line: player_line.to_string(),
        };
        let intents = self.npc_intents();
        let actions = self.npc_actions();
        let reply = adapter::npc_turn(
            oracle,
            npc,
            &mut self.state,
            &context,
            &self.memory_store,
            &intents,
            &actions,
            Self::wall_now() as i64,
        );
        ActionResult::line(format!("{}: {}", npc.name, reply.say))
    }

    fn npc_intents(&self) -> std::collections::BTreeSet<String> {
        ["greet", "evade", "trade", "warn", "ask_help", "share_info"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn npc_actions(&self) -> std::collections::BTreeSet<String> {
        ["give_bandage_to_player", "attack_melee", "leave_scene"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    // --- Persistence ---

    pub fn save(&self, slot: &str) -> Result<ActionResult, ActionError> {
        let path = persistence::save_game(
            &self.saves_dir,
            slot,
            &self.state,
            &self.quests,
            Self::wall_now() as u64,
        )?;
        Ok(ActionResult::line(format!("Partita salvata: {}", path.display())))
    }

    /// Replace the whole game state from the newest snapshot of a slot.
    pub fn load(&mut self, slot: &str) -> Result<ActionResult, ActionError> {
        let Snapshot { state, quests, .. } = persistence::load_game(&self.saves_dir, slot)?;
        self.state = state;
        self.quests = quests;
        Ok(ActionResult::line(format!("Partita caricata: {slot}")))
    }

    pub fn saves(&self) -> Vec<SaveMetadata> {
        persistence::list_saves(&self.saves_dir)
    }

    /// Reseed the RNG (for tests and debugging).
    pub fn reseed(&mut self, seed: u64) {
        self.state.rng_seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }
}
