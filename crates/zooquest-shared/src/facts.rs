//! Learned-fact tracking.
//!
//! A fact is identified by `(animal_type, content)` with exact, case-sensitive
//! matching. The first sighting is recorded and earns experience; repeats are
//! no-ops.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::profile::{level_for, LearnedFact, ProfileStore, ProfileUpdate};

/// Experience awarded for each new fact
pub const FACT_EXPERIENCE: u32 = 5;

/// Result of tracking a fact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactOutcome {
    pub is_new: bool,
    pub experience_gained: u32,
    pub did_level_up: bool,
    /// Set only when the user levelled up
    pub new_level: Option<u32>,
}

pub struct FactTracker<'a> {
    profiles: ProfileStore<'a>,
}

impl<'a> FactTracker<'a> {
    pub fn new(profiles: ProfileStore<'a>) -> Self {
        Self { profiles }
    }

    pub fn track_fact(&self, animal_type: &str, category: &str, content: &str) -> Result<FactOutcome> {
        let profile = self.profiles.get_profile();
        if profile.has_fact(animal_type, content) {
            debug!("Fact about {} already learned", animal_type);
            return Ok(FactOutcome::default());
        }

        let previous_level = level_for(profile.experience);
        let updated = self.profiles.update_profile(vec![
            ProfileUpdate::RecordFact(LearnedFact::new(animal_type, category, content)),
            ProfileUpdate::GrantExperience(FACT_EXPERIENCE),
        ])?;

        let did_level_up = updated.level > previous_level;
        info!(
            "Learned new {} fact about {} (+{} XP, total {})",
            category, animal_type, FACT_EXPERIENCE, updated.experience
        );

        Ok(FactOutcome {
            is_new: true,
            experience_gained: FACT_EXPERIENCE,
            did_level_up,
            new_level: did_level_up.then_some(updated.level),
        })
    }

    /// Facts learned about one animal, oldest first
    pub fn facts_for(&self, animal_type: &str) -> Vec<LearnedFact> {
        self.profiles
            .get_profile()
            .learned_facts
            .into_iter()
            .filter(|f| f.animal_type == animal_type)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_new_fact_awards_experience() {
        let store = MemoryStore::new();
        let tracker = FactTracker::new(ProfileStore::new(&store));
        let outcome = tracker.track_fact("lion", "general", "Lions sleep 20h").unwrap();
        assert!(outcome.is_new);
        assert_eq!(outcome.experience_gained, 5);
        assert!(!outcome.did_level_up);
        assert_eq!(outcome.new_level, None);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let store = MemoryStore::new();
        let tracker = FactTracker::new(ProfileStore::new(&store));
        tracker.track_fact("lion", "general", "Lions sleep 20h").unwrap();
        let other = tracker.track_fact("lion", "general", "lions sleep 20h").unwrap();
        assert!(other.is_new);
        let other_animal = tracker.track_fact("tiger", "general", "Lions sleep 20h").unwrap();
        assert!(other_animal.is_new);
        assert_eq!(tracker.facts_for("lion").len(), 2);
    }

    #[test]
    fn test_category_does_not_affect_identity() {
        let store = MemoryStore::new();
        let tracker = FactTracker::new(ProfileStore::new(&store));
        tracker.track_fact("lion", "general", "Lions sleep 20h").unwrap();
        let again = tracker.track_fact("lion", "diet", "Lions sleep 20h").unwrap();
        assert!(!again.is_new);
    }
}
