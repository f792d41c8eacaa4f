//! Procedural side quests from weighted templates.
//!
//! Templates are filtered by their `when` conditions, weighted by the
//! current scene (daytime, weather, location, morale band), and drawn
//! without replacement. Every draw uses the injected RNG, so a seeded
//! run reproduces its side quests.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use ashfall_core::enums::Daytime;
use ashfall_core::state::GameState;

use crate::dsl::check_all;
use crate::journal;
use crate::model::{Condition, Quest, QuestPriority, Reward, Step};

/// A goal inside a quest template; each maps to one generated step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Goal {
    Collect {
        item: String,
        #[serde(default = "default_qty")]
        qty: u32,
        #[serde(default)]
        area: Option<String>,
    },
    Escort {
        npc: String,
        #[serde(default)]
        to: Option<String>,
    },
    Reach {
        #[serde(default)]
        world: Option<String>,
        #[serde(rename = "macro", default)]
        macro_room: Option<String>,
        #[serde(default)]
        micro: Option<String>,
    },
    Survive {
        #[serde(default = "default_duration")]
        duration: i64,
    },
}

fn default_qty() -> u32 {
    1
}

fn default_duration() -> i64 {
    60
}

/// A side quest template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestTemplate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub when: Vec<Condition>,
    #[serde(default = "default_weight")]
    pub base_weight: f64,
    /// Context multipliers keyed by daytime/weather token,
    /// `location_<macro>`, `low_morale`, `high_morale`.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub rewards: Reward,
}

fn default_weight() -> f64 {
    1.0
}

/// Effective weight of a template under the current scene.
fn effective_weight(template: &QuestTemplate, state: &GameState) -> f64 {
    let mut weight = template.base_weight;
    if let Some(mult) = template.weights.get(state.clock.daytime.as_str()) {
        weight *= mult;
    }
    if let Some(mult) = template.weights.get(state.clock.weather.as_str()) {
        weight *= mult;
    }
    if let Some(mult) = template
        .weights
        .get(&format!("location_{}", state.current_macro))
    {
        weight *= mult;
    }
    let morale = state.stats.morale();
    if morale < 30 {
        if let Some(mult) = template.weights.get("low_morale") {
            weight *= mult;
        }
    } else if morale > 70 {
        if let Some(mult) = template.weights.get("high_morale") {
            weight *= mult;
        }
    }
    weight.max(0.0)
}

fn step_from_goal(goal: &Goal, index: usize) -> Step {
    match goal {
        Goal::Collect { item, qty, area } => {
            let mut description = format!("Trova {qty}x {item}");
            if let Some(area) = area {
                description.push_str(&format!(" nell'area {area}"));
            }
            Step {
                id: format!("collect_{index}"),
                title: format!("Raccogli {item}"),
                description,
                enter_conditions: vec![],
                complete_conditions: vec![Condition::HasItem {
                    id: item.clone(),
                    qty: *qty,
                }],
                on_enter_flags: BTreeMap::new(),
                on_complete_flags: BTreeMap::new(),
            }
        }
        Goal::Escort { npc, to } => {
            let mut description = format!("Accompagna {npc} al sicuro");
            if let Some(to) = to {
                description.push_str(&format!(" verso {to}"));
            }
            Step {
                id: format!("escort_{index}"),
                title: format!("Scorta {npc}"),
                description,
                enter_conditions: vec![],
                complete_conditions: vec![Condition::FlagIs {
                    key: format!("escort_{npc}_complete"),
                    value: true.into(),
                }],
                on_enter_flags: BTreeMap::new(),
                on_complete_flags: BTreeMap::new(),
            }
        }
        Goal::Reach {
            world,
            macro_room,
            micro,
        } => Step {
            id: format!("reach_{index}"),
            title: "Raggiungi il luogo".to_string(),
            description: "Raggiungi la destinazione indicata".to_string(),
            enter_conditions: vec![],
            complete_conditions: vec![Condition::InLocation {
                world: world.clone(),
                macro_room: macro_room.clone(),
                micro: micro.clone(),
            }],
            on_enter_flags: BTreeMap::new(),
            on_complete_flags: BTreeMap::new(),
        },
        Goal::Survive { duration } => Step {
            id: format!("survive_{index}"),
            title: "Sopravvivi".to_string(),
            description: format!("Sopravvivi per {duration} minuti"),
            enter_conditions: vec![],
            complete_conditions: vec![Condition::FlagIs {
                key: format!("survived_{duration}min"),
                value: true.into(),
            }],
            on_enter_flags: BTreeMap::new(),
            on_complete_flags: BTreeMap::new(),
        },
    }
}

/// Seed the generated quest with scene-flavored journal nodes.
fn journal_nodes(template: &QuestTemplate, quest_id: &str, state: &GameState) -> BTreeMap<String, String> {
    let mut nodes = BTreeMap::new();
    nodes.insert(
        journal::node_key(quest_id, "start", "default"),
        format!("Una nuova opportunità si presenta: {}", template.title),
    );
    nodes.insert(
        journal::node_key(quest_id, "complete", "default"),
        "L'obiettivo è stato raggiunto. È tempo di andare avanti.".to_string(),
    );
    if state.clock.weather.is_rainy() {
        nodes.insert(
            journal::node_key(quest_id, "start", "rain"),
            format!(
                "La pioggia batte forte mentre considero questa nuova sfida: {}",
                template.title
            ),
        );
    }
    if state.clock.daytime == Daytime::Night {
        nodes.insert(
            journal::node_key(quest_id, "start", "night"),
            format!(
                "L'oscurità avvolge tutto, ma la necessità è chiara: {}",
                template.title
            ),
        );
    }
    nodes
}

fn instantiate<R: Rng>(template: &QuestTemplate, state: &GameState, rng: &mut R) -> Option<Quest> {
    let nonce = rng.gen_range(1000..10000);
    let quest_id = format!("side_{}_{nonce}", template.id);
    let steps: Vec<Step> = template
        .goals
        .iter()
        .enumerate()
        .map(|(i, g)| step_from_goal(g, i))
        .collect();
    if steps.is_empty() {
        return None;
    }
    let mut quest = Quest::new(&quest_id, &template.title);
    quest.priority = QuestPriority::Side;
    quest.steps = steps;
    quest.rewards_on_complete = template.rewards.clone();
    quest.journal_nodes = journal_nodes(template, &quest_id, state);
    Some(quest)
}

/// Generate up to `max_quests` side quests by weighted draw without
/// replacement.
pub fn generate_side_quests<R: Rng>(
    templates: &[QuestTemplate],
    state: &GameState,
    max_quests: usize,
    rng: &mut R,
) -> Vec<Quest> {
    let mut eligible: Vec<(&QuestTemplate, f64)> = templates
        .iter()
        .filter(|t| check_all(&t.when, state))
        .map(|t| (t, effective_weight(t, state)))
        .filter(|(_, w)| *w > 0.0)
        .collect();

    let mut generated = Vec::new();
    while generated.len() < max_quests && !eligible.is_empty() {
        let total: f64 = eligible.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            break;
        }
        let selection = rng.gen::<f64>() * total;
        let mut acc = 0.0;
        let mut chosen = eligible.len() - 1;
        for (i, (_, w)) in eligible.iter().enumerate() {
            acc += w;
            if acc >= selection {
                chosen = i;
                break;
            }
        }
        let (template, _) = eligible.remove(chosen);
        if let Some(quest) = instantiate(template, state, rng) {
            generated.push(quest);
        }
    }
    generated
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashfall_core::enums::Weather;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn state() -> GameState {
        let mut s = GameState::new("w", "forest", "clearing");
        s.clock.recompute(1_700_000_000.0);
        s
    }

    fn template(id: &str, base_weight: f64) -> QuestTemplate {
        QuestTemplate {
            id: id.to_string(),
            title: format!("Template {id}"),
            when: vec![],
            base_weight,
            weights: BTreeMap::new(),
            goals: vec![Goal::Collect {
                item: "scrap".to_string(),
                qty: 2,
                area: None,
            }],
            rewards: Reward::default(),
        }
    }

    #[test]
    fn generates_without_replacement() {
        let templates = vec![template("a", 1.0), template("b", 1.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let quests = generate_side_quests(&templates, &state(), 5, &mut rng);
        assert_eq!(quests.len(), 2);
        assert_ne!(quests[0].id, quests[1].id);
        assert!(quests.iter().all(|q| q.priority == QuestPriority::Side));
        assert!(quests[0].id.starts_with("side_"));
        let nonce = quests[0].id.rsplit('_').next().unwrap();
        assert_eq!(nonce.len(), 4);
    }

    #[test]
    fn same_seed_same_quests() {
        let templates = vec![template("a", 1.0), template("b", 3.0), template("c", 0.5)];
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            generate_side_quests(&templates, &state(), 2, &mut rng)
                .into_iter()
                .map(|q| q.id)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn when_conditions_filter_templates() {
        let mut gated = template("gated", 1.0);
        gated.when = vec![Condition::WeatherIn {
            any: vec!["pioggia".to_string()],
        }];
        let templates = vec![gated];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut s = state();
        assert!(generate_side_quests(&templates, &s, 3, &mut rng).is_empty());
        s.clock.weather = Weather::Rain;
        assert_eq!(generate_side_quests(&templates, &s, 3, &mut rng).len(), 1);
    }

    #[test]
    fn zero_weight_excludes() {
        let mut t = template("night_only", 1.0);
        t.weights.insert("giorno".to_string(), 0.0);
        let mut s = state();
        s.clock.wait(7 * 60); // into the day band
        s.clock.recompute(1_700_000_000.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(generate_side_quests(&[t], &s, 3, &mut rng).is_empty());
    }

    #[test]
    fn rain_seeds_rain_journal_node() {
        let mut s = state();
        s.clock.weather = Weather::Rain;
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let quests = generate_side_quests(&[template("a", 1.0)], &s, 1, &mut rng);
        let quest = &quests[0];
        assert!(quest
            .journal_nodes
            .keys()
            .any(|k| k.ends_with(".start.rain")));
    }

    #[test]
    fn goal_kinds_map_to_steps() {
        let mut t = template("multi", 1.0);
        t.goals = vec![
            Goal::Collect {
                item: "fungo".into(),
                qty: 3,
                area: Some("bosco".into()),
            },
            Goal::Reach {
                world: None,
                macro_room: Some("rifugio".into()),
                micro: None,
            },
            Goal::Survive { duration: 30 },
            Goal::Escort {
                npc: "marco".into(),
                to: Some("rifugio".into()),
            },
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let quests = generate_side_quests(&[t], &state(), 1, &mut rng);
        let steps = &quests[0].steps;
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].id, "collect_0");
        assert_eq!(steps[1].id, "reach_1");
        assert_eq!(steps[2].id, "survive_2");
        assert_eq!(steps[3].id, "escort_3");
    }
}
