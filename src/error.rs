use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Request text is empty")]
    EmptyRequest,

    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        task: crate::core::task::TaskId,
        dependency: crate::core::task::TaskId,
    },

    #[error("Task {task} cannot depend on itself")]
    SelfDependency { task: crate::core::task::TaskId },

    #[error("Task not found in plan: {id}")]
    TaskNotFound { id: crate::core::task::TaskId },

    #[error("Agent already registered: {id}")]
    DuplicateAgent {
        id: crate::orchestration::registry::AgentId,
    },

    #[error("Agent not found: {id}")]
    AgentNotFound {
        id: crate::orchestration::registry::AgentId,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
