//! Quest engine: tiered event counters that mint badges.
//!
//! Every quest type has a fixed tier list from [`quest_catalog`]. One call to
//! [`QuestEngine::update_progress`] records one event. When progress reaches
//! the current tier's threshold the quest advances exactly one tier, mints the
//! tier's badge and grants its reward, even if progress already covers later
//! tiers. Once every tier is done the quest only keeps counting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{Result, ZooQuestError};
use crate::profile::{Badge, ProfileStore, ProfileUpdate};
use crate::storage::{keys, read_json, write_json, KeyValueStore};

/// Stored quest state, keyed by quest type
pub type QuestBook = BTreeMap<String, QuestState>;

/// Static definition of a quest type
#[derive(Debug, Clone, Copy)]
pub struct QuestTemplate {
    pub quest_type: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// (threshold, reward, title) per tier
    pub levels: &'static [(u32, u32, &'static str)],
}

impl QuestTemplate {
    fn instantiate(&self, now: DateTime<Utc>) -> QuestState {
        QuestState {
            quest_type: self.quest_type.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            levels: self
                .levels
                .iter()
                .map(|&(threshold, reward, title)| QuestLevel {
                    threshold,
                    reward,
                    title: title.to_string(),
                })
                .collect(),
            current_level: 0,
            progress: 0,
            completed_levels: Vec::new(),
            last_updated: now,
        }
    }
}

/// All quest types
pub fn quest_catalog() -> Vec<QuestTemplate> {
    vec![
        QuestTemplate {
            quest_type: "chat_with_animals",
            title: "Animal Conversations",
            description: "Chat with different animals to learn about them",
            levels: &[(1, 10, "First Contact"), (5, 50, "Friendly Explorer"), (10, 100, "Animal Whisperer")],
        },
        QuestTemplate {
            quest_type: "learn_facts",
            title: "Knowledge Collector",
            description: "Learn interesting facts about animals",
            levels: &[(3, 15, "Curious Mind"), (10, 60, "Fact Finder"), (25, 150, "Wildlife Scholar")],
        },
        QuestTemplate {
            quest_type: "endangered_awareness",
            title: "Conservation Champion",
            description: "Learn about endangered species and conservation",
            levels: &[(2, 20, "Conservation Aware"), (5, 75, "Habitat Protector"), (10, 200, "Conservation Hero")],
        },
        QuestTemplate {
            quest_type: "biome_explorer",
            title: "Biome Explorer",
            description: "Discover animals from different habitats around the world",
            levels: &[(2, 20, "Habitat Visitor"), (4, 80, "Ecosystem Explorer"), (6, 180, "Global Naturalist")],
        },
    ]
}

/// One tier of a quest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestLevel {
    /// Progress count needed to complete the tier
    #[serde(rename = "count", alias = "threshold")]
    pub threshold: u32,
    pub reward: u32,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedLevel {
    /// 1-based tier number
    pub level: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestState {
    #[serde(rename = "type")]
    pub quest_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub levels: Vec<QuestLevel>,
    /// Number of tiers completed; index of the next tier
    pub current_level: usize,
    pub progress: u32,
    #[serde(default)]
    pub completed_levels: Vec<CompletedLevel>,
    pub last_updated: DateTime<Utc>,
}

impl QuestState {
    /// The tier being worked towards, `None` once all are complete
    pub fn next_tier(&self) -> Option<&QuestLevel> {
        self.levels.get(self.current_level)
    }

    pub fn is_complete(&self) -> bool {
        self.current_level >= self.levels.len()
    }
}

/// Result of one quest event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub quest_type: String,
    pub new_progress: u32,
    pub leveled_up: bool,
    pub experience_gained: u32,
    pub new_badge: Option<Badge>,
}

/// Summary of a quest that still has tiers left
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveQuest {
    pub quest_type: String,
    pub title: String,
    pub description: String,
    pub progress: u32,
    pub current_level: usize,
    pub target_count: u32,
    pub progress_percent: u32,
    pub next_reward: u32,
    pub next_title: String,
}

impl ActiveQuest {
    fn from_state(quest: &QuestState) -> Option<Self> {
        let tier = quest.next_tier()?;
        let progress_percent = if tier.threshold > 0 {
            let pct = (quest.progress as f64 / tier.threshold as f64 * 100.0).round();
            pct.min(100.0) as u32
        } else {
            100
        };

        Some(Self {
            quest_type: quest.quest_type.clone(),
            title: quest.title.clone(),
            description: quest.description.clone(),
            progress: quest.progress,
            current_level: quest.current_level,
            target_count: tier.threshold,
            progress_percent,
            next_reward: tier.reward,
            next_title: tier.title.clone(),
        })
    }
}

pub struct QuestEngine<'a> {
    store: &'a dyn KeyValueStore,
    profiles: ProfileStore<'a>,
}

impl<'a> QuestEngine<'a> {
    pub fn new(store: &'a dyn KeyValueStore, profiles: ProfileStore<'a>) -> Self {
        Self { store, profiles }
    }

    /// Load quest state, seeding any catalog quest that has no state yet.
    /// Safe to call repeatedly.
    pub fn initialize_quests(&self) -> QuestBook {
        let (mut book, loaded) = match read_json::<QuestBook>(self.store, keys::USER_QUESTS) {
            Ok(stored) => (stored.unwrap_or_default(), true),
            Err(e) => {
                warn!("Failed to load quests: {}. Starting from an empty quest book", e);
                (QuestBook::new(), false)
            }
        };

        let now = Utc::now();
        let mut seeded = 0;
        for template in quest_catalog() {
            if !book.contains_key(template.quest_type) {
                book.insert(template.quest_type.to_string(), template.instantiate(now));
                seeded += 1;
            }
        }

        if seeded > 0 && loaded {
            debug!("Seeded {} quests", seeded);
            if let Err(e) = write_json(self.store, keys::USER_QUESTS, &book) {
                warn!("Failed to persist seeded quests: {}", e);
            }
        }
        book
    }

    /// Record one event for `quest_type`. `context` (e.g. a habitat id) is
    /// only logged.
    pub fn update_progress(&self, quest_type: &str, context: Option<&str>) -> Result<QuestProgress> {
        let mut book = self.initialize_quests();
        let quest = book
            .get_mut(quest_type)
            .ok_or_else(|| ZooQuestError::UnknownQuest(quest_type.to_string()))?;

        let now = Utc::now();
        let new_progress = quest.progress.saturating_add(1);
        quest.progress = new_progress;
        quest.last_updated = now;

        let crossed = quest
            .next_tier()
            .filter(|tier| new_progress >= tier.threshold)
            .cloned();

        let mut outcome = QuestProgress {
            quest_type: quest_type.to_string(),
            new_progress,
            leveled_up: false,
            experience_gained: 0,
            new_badge: None,
        };

        let mut profile_updates = Vec::new();
        if let Some(tier) = crossed {
            let index = quest.current_level;
            let badge = Badge {
                id: format!("badge_{}_{}", quest_type, index),
                name: tier.title.clone(),
                description: format!("{} - Level {}", quest.title, index + 1),
                quest_type: quest_type.to_string(),
                level: index as u32 + 1,
                earned_at: now,
            };

            quest.current_level += 1;
            quest.completed_levels.push(CompletedLevel {
                level: index as u32 + 1,
                completed_at: now,
            });

            info!(
                "Quest {} reached tier {} ({}), +{} XP",
                quest_type, index + 1, tier.title, tier.reward
            );

            profile_updates.push(ProfileUpdate::GrantExperience(tier.reward));
            profile_updates.push(ProfileUpdate::AwardBadge(badge.clone()));
            if quest.is_complete() {
                profile_updates.push(ProfileUpdate::CompleteQuest(quest_type.to_string()));
            }

            outcome.leveled_up = true;
            outcome.experience_gained = tier.reward;
            outcome.new_badge = Some(badge);
        } else {
            debug!(
                "Quest {} progress {} (context: {})",
                quest_type,
                new_progress,
                context.unwrap_or("-")
            );
        }

        // Quest state first: a failed profile write loses a reward rather
        // than letting a retry award it twice.
        write_json(self.store, keys::USER_QUESTS, &book)?;
        if !profile_updates.is_empty() {
            self.profiles.update_profile(profile_updates)?;
        }

        Ok(outcome)
    }

    /// Quests with tiers remaining, in catalog key order
    pub fn active_quests(&self) -> Vec<ActiveQuest> {
        self.initialize_quests()
            .values()
            .filter_map(ActiveQuest::from_state)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn engine(store: &MemoryStore) -> QuestEngine<'_> {
        QuestEngine::new(store, ProfileStore::new(store))
    }

    #[test]
    fn test_catalog_tiers_are_ascending() {
        for template in quest_catalog() {
            assert_eq!(template.levels.len(), 3, "{}", template.quest_type);
            assert!(template.levels.windows(2).all(|w| w[0].0 < w[1].0));
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let store = MemoryStore::new();
        let engine = engine(&store);
        let first = engine.initialize_quests();
        engine.update_progress("learn_facts", None).unwrap();
        let second = engine.initialize_quests();
        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);
        assert_eq!(second["learn_facts"].progress, 1);
    }

    #[test]
    fn test_missing_catalog_quest_is_seeded_into_existing_book() {
        let store = MemoryStore::new();
        let engine = engine(&store);
        let mut book = engine.initialize_quests();
        book.remove("biome_explorer");
        write_json(&store, keys::USER_QUESTS, &book).unwrap();

        let result = engine.update_progress("biome_explorer", Some("savanna")).unwrap();
        assert_eq!(result.new_progress, 1);
    }

    #[test]
    fn test_unknown_quest_type() {
        let store = MemoryStore::new();
        let result = engine(&store).update_progress("conservation_action", Some("plastic"));
        assert!(matches!(result, Err(ZooQuestError::UnknownQuest(q)) if q == "conservation_action"));
    }

    #[test]
    fn test_progress_percent_is_capped() {
        let quest = QuestState {
            progress: 12,
            current_level: 1,
            ..quest_catalog()[0].instantiate(Utc::now())
        };
        let active = ActiveQuest::from_state(&quest).unwrap();
        assert_eq!(active.target_count, 5);
        assert_eq!(active.progress_percent, 100);
        assert_eq!(active.next_title, "Friendly Explorer");
    }

    #[test]
    fn test_stored_quest_uses_count_field() {
        let store = MemoryStore::new();
        engine(&store).initialize_quests();
        let raw = store.get(keys::USER_QUESTS).unwrap().unwrap();
        assert!(raw.contains("\"count\""));
        assert!(raw.contains("\"currentLevel\""));
        assert!(raw.contains("\"type\""));
    }
}
