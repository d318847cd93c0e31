//! Conservation ledger.
//!
//! Purely additive bookkeeping around earned experience:
//! - allocations of points to external conservation projects, bounded by the
//!   points not yet allocated,
//! - a checklist of real-world conservation tasks that grant experience,
//! - free-text reflections.
//!
//! Unticking a task removes it from the completed set but keeps the
//! experience it granted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{Result, ZooQuestError};
use crate::profile::{ProfileStore, ProfileUpdate};
use crate::storage::{keys, read_json_or_default, write_json, KeyValueStore};

/// Experience awarded for a submitted reflection
pub const REFLECTION_EXPERIENCE: u32 = 50;

/// Cumulative points per project id
pub type Allocations = BTreeMap<String, u32>;

/// Completed task ids per action id
pub type CompletedTasks = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy)]
pub struct ConservationTask {
    pub id: &'static str,
    pub text: &'static str,
    pub points: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ConservationAction {
    pub id: &'static str,
    pub title: &'static str,
    pub tasks: &'static [ConservationTask],
}

impl ConservationAction {
    pub fn task(&self, task_id: &str) -> Option<&ConservationTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

const fn task(id: &'static str, text: &'static str, points: u32) -> ConservationTask {
    ConservationTask { id, text, points }
}

/// Real-world actions and their checklist tasks
pub fn conservation_actions() -> &'static [ConservationAction] {
    const ACTIONS: &[ConservationAction] = &[
        ConservationAction {
            id: "plastic",
            title: "Reduce Plastic Use",
            tasks: &[
                task("reusable-bottle", "Use a reusable water bottle", 10),
                task("reusable-bags", "Shop with reusable bags", 10),
                task("plastic-free-day", "Have a plastic-free day", 20),
                task("beach-cleanup", "Participate in a beach cleanup", 50),
            ],
        },
        ConservationAction {
            id: "plants",
            title: "Plant for Wildlife",
            tasks: &[
                task("native-plant", "Plant a native species", 30),
                task("pollinator-garden", "Create a pollinator garden", 40),
                task("bird-feeder", "Install a bird feeder", 15),
                task("tree-planting", "Join a community tree planting event", 50),
            ],
        },
        ConservationAction {
            id: "water",
            title: "Water Conservation",
            tasks: &[
                task("shorter-shower", "Take a shorter shower", 10),
                task("fix-leaks", "Fix a leaky faucet", 25),
                task("rain-barrel", "Install a rain barrel", 40),
                task("irrigation", "Use efficient irrigation for plants", 20),
            ],
        },
        ConservationAction {
            id: "awareness",
            title: "Spread Awareness",
            tasks: &[
                task("social-post", "Share a conservation post on social media", 15),
                task("teach-others", "Teach someone about an endangered species", 20),
                task("documentary", "Watch a nature documentary with others", 25),
                task("petition", "Sign and share a conservation petition", 30),
            ],
        },
    ];
    ACTIONS
}

pub fn find_action(action_id: &str) -> Option<&'static ConservationAction> {
    conservation_actions().iter().find(|a| a.id == action_id)
}

/// External project that points can be allocated to
#[derive(Debug, Clone, Copy)]
pub struct ConservationProject {
    pub id: &'static str,
    pub name: &'static str,
    pub organization: &'static str,
    pub target_amount: u32,
    pub current_amount: u32,
}

pub fn conservation_projects() -> &'static [ConservationProject] {
    const PROJECTS: &[ConservationProject] = &[
        ConservationProject {
            id: "project1",
            name: "African Lion Recovery",
            organization: "Wildlife Conservation Network",
            target_amount: 10_000,
            current_amount: 7_250,
        },
        ConservationProject {
            id: "project2",
            name: "Elephant Corridors Initiative",
            organization: "Elephant Protection Trust",
            target_amount: 15_000,
            current_amount: 9_800,
        },
        ConservationProject {
            id: "project3",
            name: "Coral Reef Restoration",
            organization: "Marine Conservation Alliance",
            target_amount: 8_000,
            current_amount: 3_200,
        },
    ];
    PROJECTS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReceipt {
    pub project_id: String,
    pub amount: u32,
    pub project_total: u32,
    pub remaining_points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskToggle {
    pub action_id: String,
    pub task_id: String,
    /// State after the toggle
    pub completed: bool,
    pub experience_gained: u32,
    pub did_level_up: bool,
    pub new_level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    pub id: String,
    pub text: String,
    pub date: DateTime<Utc>,
}

pub struct ConservationLedger<'a> {
    store: &'a dyn KeyValueStore,
    profiles: ProfileStore<'a>,
}

impl<'a> ConservationLedger<'a> {
    pub fn new(store: &'a dyn KeyValueStore, profiles: ProfileStore<'a>) -> Self {
        Self { store, profiles }
    }

    pub fn allocations(&self) -> Allocations {
        read_json_or_default(self.store, keys::ALLOCATIONS)
    }

    pub fn total_allocated(&self) -> u32 {
        sum_allocations(&self.allocations())
    }

    /// `experience - sum(allocations)`, never negative
    pub fn remaining_points(&self) -> u32 {
        let experience = self.profiles.get_profile().experience;
        experience.saturating_sub(self.total_allocated())
    }

    pub fn allocate(&self, project_id: &str, amount: u32) -> Result<AllocationReceipt> {
        if project_id.trim().is_empty() {
            return Err(ZooQuestError::InvalidUpdate("project id must not be empty".to_string()));
        }
        if amount == 0 {
            return Err(ZooQuestError::InvalidUpdate("allocation must be positive".to_string()));
        }

        let experience = self.profiles.get_profile().experience;
        let mut allocations = self.allocations();
        let remaining = experience.saturating_sub(sum_allocations(&allocations));
        if amount > remaining {
            debug!("Rejected allocation of {} to {} ({} available)", amount, project_id, remaining);
            return Err(ZooQuestError::InsufficientPoints {
                requested: amount,
                remaining,
            });
        }

        let total = allocations.entry(project_id.to_string()).or_insert(0);
        *total += amount;
        let project_total = *total;
        write_json(self.store, keys::ALLOCATIONS, &allocations)?;

        info!("Allocated {} points to {} (project total {})", amount, project_id, project_total);
        Ok(AllocationReceipt {
            project_id: project_id.to_string(),
            amount,
            project_total,
            remaining_points: remaining - amount,
        })
    }

    pub fn completed_tasks(&self) -> CompletedTasks {
        read_json_or_default(self.store, keys::COMPLETED_TASKS)
    }

    /// Percentage of an action's tasks currently ticked
    pub fn action_progress(&self, action_id: &str) -> u32 {
        let Some(action) = find_action(action_id) else {
            return 0;
        };
        let done = self
            .completed_tasks()
            .get(action_id)
            .map(|ids| ids.iter().filter(|id| action.task(id).is_some()).count())
            .unwrap_or(0);
        (done * 100 / action.tasks.len().max(1)) as u32
    }

    /// Tick or untick a task. Ticking grants the task's points every time;
    /// unticking never takes them back.
    pub fn toggle_task(&self, action_id: &str, task_id: &str) -> Result<TaskToggle> {
        let task = find_action(action_id)
            .and_then(|a| a.task(task_id))
            .ok_or_else(|| ZooQuestError::UnknownTask {
                action_id: action_id.to_string(),
                task_id: task_id.to_string(),
            })?;

        let mut completed = self.completed_tasks();
        let ids = completed.entry(action_id.to_string()).or_default();

        let mut outcome = TaskToggle {
            action_id: action_id.to_string(),
            task_id: task_id.to_string(),
            completed: false,
            experience_gained: 0,
            did_level_up: false,
            new_level: None,
        };

        if let Some(pos) = ids.iter().position(|id| id == task_id) {
            ids.remove(pos);
            write_json(self.store, keys::COMPLETED_TASKS, &completed)?;
            debug!("Unticked {}/{}", action_id, task_id);
            return Ok(outcome);
        }

        ids.push(task_id.to_string());
        write_json(self.store, keys::COMPLETED_TASKS, &completed)?;

        let previous_level = self.profiles.get_profile().level;
        let profile = self
            .profiles
            .update_profile(vec![ProfileUpdate::GrantExperience(task.points)])?;
        info!("Completed {}/{} (+{} XP)", action_id, task_id, task.points);

        outcome.completed = true;
        outcome.experience_gained = task.points;
        outcome.did_level_up = profile.level > previous_level;
        outcome.new_level = outcome.did_level_up.then_some(profile.level);
        Ok(outcome)
    }

    pub fn reflections(&self) -> Vec<Reflection> {
        read_json_or_default(self.store, keys::REFLECTIONS)
    }

    pub fn submit_reflection(&self, text: &str) -> Result<Reflection> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ZooQuestError::InvalidUpdate("reflection must not be blank".to_string()));
        }

        let reflection = Reflection {
            id: uuid::Uuid::new_v4().simple().to_string(),
            text: text.to_string(),
            date: Utc::now(),
        };
        let mut reflections = self.reflections();
        reflections.push(reflection.clone());
        write_json(self.store, keys::REFLECTIONS, &reflections)?;

        self.profiles
            .update_profile(vec![ProfileUpdate::GrantExperience(REFLECTION_EXPERIENCE)])?;
        info!("Stored reflection {} (+{} XP)", reflection.id, REFLECTION_EXPERIENCE);
        Ok(reflection)
    }
}

fn sum_allocations(allocations: &Allocations) -> u32 {
    allocations.values().fold(0u32, |acc, v| acc.saturating_add(*v))
}
