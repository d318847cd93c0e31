//! User profile store.
//!
//! One profile per installation, persisted under the `userProfile` key.
//! Created with defaults on first access and never deleted.
//!
//! Writes go through typed [`ProfileUpdate`] commands rather than arbitrary
//! partial records, so every batch is validated before it touches the stored
//! profile. Level is derived from experience and recomputed on every write
//! and every load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::{Result, ZooQuestError};
use crate::storage::{keys, read_json, write_json, KeyValueStore};

/// Experience needed per level
pub const EXPERIENCE_PER_LEVEL: u32 = 100;

const MAX_NAME_LEN: usize = 64;
const MAX_AGE: u8 = 120;

/// Level for a given experience total: `floor(experience / 100) + 1`
pub fn level_for(experience: u32) -> u32 {
    experience / EXPERIENCE_PER_LEVEL + 1
}

/// Proof of a completed quest tier. Immutable once minted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    /// `badge_<questType>_<levelIndex>`
    pub id: String,
    pub name: String,
    pub description: String,
    pub quest_type: String,
    /// 1-based tier number
    pub level: u32,
    pub earned_at: DateTime<Utc>,
}

/// A fact the user has learned about an animal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LearnedFact {
    pub id: String,
    pub animal_type: String,
    pub category: String,
    pub content: String,
    pub learned_at: DateTime<Utc>,
}

impl LearnedFact {
    pub fn new(animal_type: &str, category: &str, content: &str) -> Self {
        Self {
            id: format!("fact_{}", uuid::Uuid::new_v4().simple()),
            animal_type: animal_type.to_string(),
            category: category.to_string(),
            content: content.to_string(),
            learned_at: Utc::now(),
        }
    }

    /// Exact, case-sensitive identity match
    pub fn matches(&self, animal_type: &str, content: &str) -> bool {
        self.animal_type == animal_type && self.content == content
    }
}

/// User-facing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSettings {
    pub notifications_enabled: bool,
    pub parental_controls_enabled: bool,
    pub age_appropriate_content: bool,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            parental_controls_enabled: false,
            age_appropriate_content: true,
        }
    }
}

/// Persisted user record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub age: Option<u8>,
    pub avatar: String,
    pub favorite_animals: Vec<String>,
    pub learned_facts: Vec<LearnedFact>,
    pub completed_quests: Vec<String>,
    pub experience: u32,
    pub level: u32,
    pub badges: Vec<Badge>,
    pub settings: ProfileSettings,
    pub last_visit: DateTime<Utc>,
    pub visit_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for UserProfile {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: format!("user_{}", uuid::Uuid::new_v4().simple()),
            name: "Guest Explorer".to_string(),
            age: None,
            avatar: "default".to_string(),
            favorite_animals: Vec::new(),
            learned_facts: Vec::new(),
            completed_quests: Vec::new(),
            experience: 0,
            level: 1,
            badges: Vec::new(),
            settings: ProfileSettings::default(),
            last_visit: now,
            visit_count: 0,
            created_at: now,
            last_updated: None,
        }
    }
}

impl UserProfile {
    pub fn has_fact(&self, animal_type: &str, content: &str) -> bool {
        self.learned_facts.iter().any(|f| f.matches(animal_type, content))
    }

    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges.iter().any(|b| b.id == badge_id)
    }

    /// Experience still needed to reach the next level
    pub fn experience_to_next_level(&self) -> u32 {
        self.level.saturating_mul(EXPERIENCE_PER_LEVEL).saturating_sub(self.experience)
    }

    fn recompute_level(&mut self) {
        self.level = level_for(self.experience);
    }

    fn apply(&mut self, update: ProfileUpdate) {
        match update {
            ProfileUpdate::Identity { name, age, avatar } => {
                if let Some(name) = name {
                    self.name = name.trim().to_string();
                }
                if age.is_some() {
                    self.age = age;
                }
                if let Some(avatar) = avatar {
                    self.avatar = avatar;
                }
            }
            ProfileUpdate::FavoriteAnimals(animals) => self.favorite_animals = animals,
            ProfileUpdate::Settings(settings) => self.settings = settings,
            ProfileUpdate::GrantExperience(points) => {
                self.experience = self.experience.saturating_add(points);
            }
            ProfileUpdate::AwardBadge(badge) => {
                if self.has_badge(&badge.id) {
                    debug!("Badge {} already earned, skipping", badge.id);
                } else {
                    self.badges.push(badge);
                }
            }
            ProfileUpdate::RecordFact(fact) => {
                if self.has_fact(&fact.animal_type, &fact.content) {
                    debug!("Fact for {} already recorded, skipping", fact.animal_type);
                } else {
                    self.learned_facts.push(fact);
                }
            }
            ProfileUpdate::CompleteQuest(quest_type) => {
                if !self.completed_quests.contains(&quest_type) {
                    self.completed_quests.push(quest_type);
                }
            }
            ProfileUpdate::RecordVisit => {
                self.visit_count = self.visit_count.saturating_add(1);
                self.last_visit = Utc::now();
            }
        }
    }
}

/// Typed profile mutation. Experience and badges are additive only.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileUpdate {
    Identity {
        name: Option<String>,
        age: Option<u8>,
        avatar: Option<String>,
    },
    FavoriteAnimals(Vec<String>),
    Settings(ProfileSettings),
    GrantExperience(u32),
    AwardBadge(Badge),
    RecordFact(LearnedFact),
    CompleteQuest(String),
    RecordVisit,
}

impl ProfileUpdate {
    /// Reject malformed commands before anything is merged
    pub fn validate(&self) -> Result<()> {
        match self {
            ProfileUpdate::Identity { name, age, avatar } => {
                if let Some(name) = name {
                    let trimmed = name.trim();
                    if trimmed.is_empty() {
                        return Err(invalid("name must not be blank"));
                    }
                    if trimmed.chars().count() > MAX_NAME_LEN {
                        return Err(invalid(format!("name longer than {} characters", MAX_NAME_LEN)));
                    }
                }
                if let Some(age) = age {
                    if *age > MAX_AGE {
                        return Err(invalid(format!("age {} out of range", age)));
                    }
                }
                if matches!(avatar, Some(a) if a.trim().is_empty()) {
                    return Err(invalid("avatar must not be blank"));
                }
            }
            ProfileUpdate::FavoriteAnimals(animals) => {
                if animals.iter().any(|a| a.trim().is_empty()) {
                    return Err(invalid("favorite animal must not be blank"));
                }
            }
            ProfileUpdate::AwardBadge(badge) => {
                if badge.id.is_empty() || badge.quest_type.is_empty() {
                    return Err(invalid("badge needs an id and a quest type"));
                }
            }
            ProfileUpdate::RecordFact(fact) => {
                if fact.animal_type.is_empty() || fact.content.is_empty() {
                    return Err(invalid("fact needs an animal type and content"));
                }
            }
            ProfileUpdate::CompleteQuest(quest_type) => {
                if quest_type.is_empty() {
                    return Err(invalid("quest type must not be empty"));
                }
            }
            ProfileUpdate::Settings(_)
            | ProfileUpdate::GrantExperience(_)
            | ProfileUpdate::RecordVisit => {}
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ZooQuestError {
    ZooQuestError::InvalidUpdate(msg.into())
}

/// Profile persistence over a key-value store
#[derive(Clone, Copy)]
pub struct ProfileStore<'a> {
    store: &'a dyn KeyValueStore,
    fallback: Option<&'a OnceLock<UserProfile>>,
}

impl<'a> ProfileStore<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store, fallback: None }
    }

    /// Like [`ProfileStore::new`], but an unreadable profile is replaced by
    /// one default kept in `fallback`, so its id stays stable across reads.
    pub fn with_fallback(store: &'a dyn KeyValueStore, fallback: &'a OnceLock<UserProfile>) -> Self {
        Self {
            store,
            fallback: Some(fallback),
        }
    }

    /// Load the profile, creating and persisting a default one on first access.
    /// Read or parse failures fall back to an unsaved default until the next
    /// successful write replaces the blob.
    pub fn get_profile(&self) -> UserProfile {
        match read_json::<UserProfile>(self.store, keys::USER_PROFILE) {
            Ok(Some(mut profile)) => {
                profile.recompute_level();
                profile
            }
            Ok(None) => {
                let profile = UserProfile::default();
                match write_json(self.store, keys::USER_PROFILE, &profile) {
                    Ok(()) => info!("Created profile {}", profile.id),
                    Err(e) => warn!("Failed to persist new profile {}: {}", profile.id, e),
                }
                profile
            }
            Err(e) => {
                warn!("Failed to load profile: {}. Using default", e);
                match self.fallback {
                    Some(cell) => cell.get_or_init(UserProfile::default).clone(),
                    None => UserProfile::default(),
                }
            }
        }
    }

    /// Apply a batch of updates atomically: all validate or none apply.
    pub fn update_profile(&self, updates: Vec<ProfileUpdate>) -> Result<UserProfile> {
        for update in &updates {
            update.validate()?;
        }

        let mut profile = self.get_profile();
        for update in updates {
            profile.apply(update);
        }
        profile.recompute_level();
        profile.last_updated = Some(Utc::now());

        write_json(self.store, keys::USER_PROFILE, &profile)?;
        Ok(profile)
    }

    pub fn record_visit(&self) -> Result<UserProfile> {
        self.update_profile(vec![ProfileUpdate::RecordVisit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_level_formula() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(99), 1);
        assert_eq!(level_for(100), 2);
        assert_eq!(level_for(250), 3);
    }

    #[test]
    fn test_default_profile() {
        let profile = UserProfile::default();
        assert!(profile.id.starts_with("user_"));
        assert_eq!(profile.name, "Guest Explorer");
        assert_eq!(profile.level, 1);
        assert!(profile.settings.notifications_enabled);
        assert!(!profile.settings.parental_controls_enabled);
        assert_eq!(profile.experience_to_next_level(), 100);
    }

    #[test]
    fn test_get_profile_creates_once() {
        let store = MemoryStore::new();
        let profiles = ProfileStore::new(&store);
        let first = profiles.get_profile();
        let second = profiles.get_profile();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_invalid_batch_applies_nothing() {
        let store = MemoryStore::new();
        let profiles = ProfileStore::new(&store);
        let result = profiles.update_profile(vec![
            ProfileUpdate::GrantExperience(40),
            ProfileUpdate::Identity { name: Some("   ".to_string()), age: None, avatar: None },
        ]);
        assert!(matches!(result, Err(ZooQuestError::InvalidUpdate(_))));
        assert_eq!(profiles.get_profile().experience, 0);
    }

    #[test]
    fn test_stored_level_is_recomputed_on_load() {
        let store = MemoryStore::new();
        store
            .set(keys::USER_PROFILE, r#"{"id":"user_legacy","experience":230,"level":9}"#)
            .unwrap();
        let profile = ProfileStore::new(&store).get_profile();
        assert_eq!(profile.id, "user_legacy");
        assert_eq!(profile.level, 3);
        assert_eq!(profile.name, "Guest Explorer");
    }

    #[test]
    fn test_duplicate_badge_is_ignored() {
        let store = MemoryStore::new();
        let profiles = ProfileStore::new(&store);
        let badge = Badge {
            id: "badge_learn_facts_0".to_string(),
            name: "Curious Mind".to_string(),
            description: "Knowledge Collector - Level 1".to_string(),
            quest_type: "learn_facts".to_string(),
            level: 1,
            earned_at: Utc::now(),
        };
        profiles.update_profile(vec![ProfileUpdate::AwardBadge(badge.clone())]).unwrap();
        let profile = profiles.update_profile(vec![ProfileUpdate::AwardBadge(badge)]).unwrap();
        assert_eq!(profile.badges.len(), 1);
    }

    #[test]
    fn test_identity_update_is_merged() {
        let store = MemoryStore::new();
        let profiles = ProfileStore::new(&store);
        let before = profiles.get_profile();

        let profile = profiles
            .update_profile(vec![ProfileUpdate::Identity {
                name: Some("  Maya ".to_string()),
                age: Some(9),
                avatar: Some("lion".to_string()),
            }])
            .unwrap();
        assert_eq!(profile.name, "Maya");
        assert_eq!(profile.age, Some(9));
        assert_eq!(profile.avatar, "lion");
        assert!(profile.last_updated.is_some());

        // Omitted fields keep their stored values
        let profile = profiles
            .update_profile(vec![ProfileUpdate::Identity { name: None, age: None, avatar: None }])
            .unwrap();
        assert_eq!(profile.id, before.id);
        assert_eq!(profile.name, "Maya");
        assert_eq!(profile.age, Some(9));
    }

    #[test]
    fn test_settings_and_favorites_are_replaced() {
        let store = MemoryStore::new();
        let profiles = ProfileStore::new(&store);
        let settings = ProfileSettings {
            notifications_enabled: false,
            parental_controls_enabled: true,
            age_appropriate_content: true,
        };
        profiles
            .update_profile(vec![
                ProfileUpdate::FavoriteAnimals(vec!["lion".to_string(), "zebra".to_string()]),
                ProfileUpdate::Settings(settings.clone()),
            ])
            .unwrap();

        let stored = profiles.get_profile();
        assert_eq!(stored.favorite_animals, vec!["lion", "zebra"]);
        assert_eq!(stored.settings, settings);
        assert!(stored.last_updated.is_some());
    }

    #[test]
    fn test_invalid_age_and_animal_leave_profile_untouched() {
        let store = MemoryStore::new();
        let profiles = ProfileStore::new(&store);
        profiles
            .update_profile(vec![ProfileUpdate::Identity {
                name: Some("Maya".to_string()),
                age: Some(9),
                avatar: None,
            }])
            .unwrap();
        let before = store.get(keys::USER_PROFILE).unwrap();

        let too_old = profiles.update_profile(vec![ProfileUpdate::Identity {
            name: Some("Maya".to_string()),
            age: Some(121),
            avatar: None,
        }]);
        assert!(matches!(too_old, Err(ZooQuestError::InvalidUpdate(_))));

        let blank_animal = profiles.update_profile(vec![
            ProfileUpdate::GrantExperience(10),
            ProfileUpdate::FavoriteAnimals(vec!["lion".to_string(), " ".to_string()]),
        ]);
        assert!(matches!(blank_animal, Err(ZooQuestError::InvalidUpdate(_))));

        assert_eq!(store.get(keys::USER_PROFILE).unwrap(), before);
        let stored = profiles.get_profile();
        assert_eq!(stored.age, Some(9));
        assert_eq!(stored.experience, 0);
        assert!(stored.favorite_animals.is_empty());
    }

    #[test]
    fn test_record_visit_bumps_count_and_time() {
        let store = MemoryStore::new();
        let profiles = ProfileStore::new(&store);
        let first = profiles.get_profile();
        assert_eq!(first.visit_count, 0);

        let visited = profiles.record_visit().unwrap();
        assert_eq!(visited.visit_count, 1);
        assert!(visited.last_visit >= first.last_visit);
        let visited = profiles.record_visit().unwrap();
        assert_eq!(visited.visit_count, 2);
        assert_eq!(profiles.get_profile().visit_count, 2);
    }

    #[test]
    fn test_huge_experience_does_not_overflow() {
        let store = MemoryStore::new();
        let profiles = ProfileStore::new(&store);
        let profile = profiles
            .update_profile(vec![
                ProfileUpdate::GrantExperience(u32::MAX),
                ProfileUpdate::GrantExperience(1),
            ])
            .unwrap();
        assert_eq!(profile.experience, u32::MAX);
        assert_eq!(profile.level, level_for(u32::MAX));
        assert_eq!(profile.experience_to_next_level(), 0);
    }

    #[test]
    fn test_unreadable_profile_keeps_one_fallback_id() {
        let store = MemoryStore::new();
        store.set(keys::USER_PROFILE, "{ not json").unwrap();
        let fallback = OnceLock::new();
        let profiles = ProfileStore::with_fallback(&store, &fallback);

        let first = profiles.get_profile();
        let second = profiles.get_profile();
        assert_eq!(first.id, second.id);

        let written = profiles.update_profile(vec![ProfileUpdate::GrantExperience(5)]).unwrap();
        assert_eq!(written.id, first.id);
        assert_eq!(profiles.get_profile().id, first.id);
    }
}
