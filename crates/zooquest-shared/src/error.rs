//! Error types for ZooQuest.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZooQuestError {
    #[error("Not enough conservation points: requested {requested}, available {remaining}")]
    InsufficientPoints { requested: u32, remaining: u32 },

    #[error("Unknown quest type: {0}")]
    UnknownQuest(String),

    #[error("Unknown conservation task: {action_id}/{task_id}")]
    UnknownTask { action_id: String, task_id: String },

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ZooQuestError {
    /// Stable short code for CLI exit reporting
    pub fn code(&self) -> &'static str {
        match self {
            ZooQuestError::InsufficientPoints { .. } => "insufficient_points",
            ZooQuestError::UnknownQuest(_) => "unknown_quest",
            ZooQuestError::UnknownTask { .. } => "unknown_task",
            ZooQuestError::InvalidUpdate(_) => "invalid_update",
            ZooQuestError::Storage(_) => "storage",
            ZooQuestError::Io(_) => "io",
            ZooQuestError::Json(_) => "json",
            ZooQuestError::Toml(_) | ZooQuestError::TomlSer(_) => "config",
            ZooQuestError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, ZooQuestError>;
