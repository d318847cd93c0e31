//! Single-writer facade over one user's progression state.
//!
//! Profile, quests and conservation records for a user form one consistency
//! domain. Every mutating call takes the write lock for the whole
//! read-modify-write, so concurrent callers cannot interleave and break the
//! monotonic experience/progress invariants.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::conservation::{
    AllocationReceipt, Allocations, CompletedTasks, ConservationLedger, Reflection, TaskToggle,
};
use crate::error::{Result, ZooQuestError};
use crate::facts::{FactOutcome, FactTracker};
use crate::profile::{LearnedFact, ProfileStore, ProfileUpdate, UserProfile};
use crate::quests::{ActiveQuest, QuestBook, QuestEngine, QuestProgress};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};

pub struct ZooQuest {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
    /// Profile served while the stored one is unreadable
    fallback_profile: OnceLock<UserProfile>,
}

impl ZooQuest {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            fallback_profile: OnceLock::new(),
        }
    }

    pub fn open(data_dir: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(data_dir)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| ZooQuestError::Internal("progression lock poisoned".to_string()))
    }

    fn profile_store(&self) -> ProfileStore<'_> {
        ProfileStore::with_fallback(self.store.as_ref(), &self.fallback_profile)
    }

    fn quest_engine(&self) -> QuestEngine<'_> {
        QuestEngine::new(self.store.as_ref(), self.profile_store())
    }

    fn ledger(&self) -> ConservationLedger<'_> {
        ConservationLedger::new(self.store.as_ref(), self.profile_store())
    }

    pub fn profile(&self) -> Result<UserProfile> {
        let _guard = self.lock()?;
        Ok(self.profile_store().get_profile())
    }

    pub fn update_profile(&self, updates: Vec<ProfileUpdate>) -> Result<UserProfile> {
        let _guard = self.lock()?;
        self.profile_store().update_profile(updates)
    }

    pub fn record_visit(&self) -> Result<UserProfile> {
        let _guard = self.lock()?;
        self.profile_store().record_visit()
    }

    pub fn track_fact(&self, animal_type: &str, category: &str, content: &str) -> Result<FactOutcome> {
        let _guard = self.lock()?;
        FactTracker::new(self.profile_store()).track_fact(animal_type, category, content)
    }

    pub fn facts_for(&self, animal_type: &str) -> Result<Vec<LearnedFact>> {
        let _guard = self.lock()?;
        Ok(FactTracker::new(self.profile_store()).facts_for(animal_type))
    }

    pub fn quests(&self) -> Result<QuestBook> {
        let _guard = self.lock()?;
        Ok(self.quest_engine().initialize_quests())
    }

    pub fn update_quest(&self, quest_type: &str, context: Option<&str>) -> Result<QuestProgress> {
        let _guard = self.lock()?;
        self.quest_engine().update_progress(quest_type, context)
    }

    pub fn active_quests(&self) -> Result<Vec<ActiveQuest>> {
        let _guard = self.lock()?;
        Ok(self.quest_engine().active_quests())
    }

    pub fn allocate(&self, project_id: &str, amount: u32) -> Result<AllocationReceipt> {
        let _guard = self.lock()?;
        self.ledger().allocate(project_id, amount)
    }

    pub fn allocations(&self) -> Result<Allocations> {
        let _guard = self.lock()?;
        Ok(self.ledger().allocations())
    }

    pub fn remaining_points(&self) -> Result<u32> {
        let _guard = self.lock()?;
        Ok(self.ledger().remaining_points())
    }

    pub fn toggle_task(&self, action_id: &str, task_id: &str) -> Result<TaskToggle> {
        let _guard = self.lock()?;
        self.ledger().toggle_task(action_id, task_id)
    }

    pub fn completed_tasks(&self) -> Result<CompletedTasks> {
        let _guard = self.lock()?;
        Ok(self.ledger().completed_tasks())
    }

    pub fn action_progress(&self, action_id: &str) -> Result<u32> {
        let _guard = self.lock()?;
        Ok(self.ledger().action_progress(action_id))
    }

    pub fn submit_reflection(&self, text: &str) -> Result<Reflection> {
        let _guard = self.lock()?;
        self.ledger().submit_reflection(text)
    }

    pub fn reflections(&self) -> Result<Vec<Reflection>> {
        let _guard = self.lock()?;
        Ok(self.ledger().reflections())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_concurrent_fact_tracking_awards_once() {
        let zq = Arc::new(ZooQuest::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let zq = Arc::clone(&zq);
                thread::spawn(move || zq.track_fact("lion", "general", "Lions sleep 20h").unwrap())
            })
            .collect();

        let new_count = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| o.is_new)
            .count();

        assert_eq!(new_count, 1);
        assert_eq!(zq.profile().unwrap().experience, 5);
    }

    #[test]
    fn test_concurrent_allocations_stay_bounded() {
        let zq = Arc::new(ZooQuest::in_memory());
        zq.update_profile(vec![ProfileUpdate::GrantExperience(100)]).unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let zq = Arc::clone(&zq);
                thread::spawn(move || zq.allocate("project2", 30).is_ok())
            })
            .collect();
        let successes = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

        assert_eq!(successes, 3);
        assert_eq!(zq.remaining_points().unwrap(), 10);
    }
}
