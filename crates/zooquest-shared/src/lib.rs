//! Shared progression engine for ZooQuest components.
//!
//! Profile, learned facts, quests, conservation bookkeeping and
//! chat-with-an-animal sessions, all persisted as JSON blobs in a
//! key-value store.

pub mod chat;
pub mod config;
pub mod conservation;
pub mod error;
pub mod facts;
pub mod profile;
pub mod progression;
pub mod quests;
pub mod storage;

pub use chat::{AnimalChat, AnimalPersona, ChatCompletion, ChatError, ChatSessionStore, FakeChatClient};
pub use config::ZooQuestConfig;
pub use conservation::ConservationLedger;
pub use error::ZooQuestError;
pub use facts::{FactOutcome, FactTracker};
pub use profile::{level_for, Badge, ProfileStore, ProfileUpdate, UserProfile};
pub use progression::ZooQuest;
pub use quests::{QuestEngine, QuestProgress};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
