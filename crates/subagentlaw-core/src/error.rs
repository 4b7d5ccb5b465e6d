//! Crate-wide error type shared by the registry, arbiter, and supervisor.

use thiserror::Error;

/// Crate-wide error type for the supervisor and permission arbiter.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("capacity exceeded: {active}/{max} agents already running")]
    CapacityExceeded { active: usize, max: usize },

    #[error("unknown agent type: {0}")]
    UnknownAgentType(String),

    #[error("unknown resume id: {0}")]
    UnknownResumeId(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("task restricted: agent type {requested} not permitted for this caller")]
    TaskRestricted { requested: String },

    #[error("invalid update type: {0}")]
    InvalidUpdateType(String),

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("validation failed for {path}: {reason}")]
    Validation { path: String, reason: String },

    #[error("run loop failure: {0}")]
    RunLoopFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn task_restricted(requested: impl Into<String>) -> Self {
        Self::TaskRestricted {
            requested: requested.into(),
        }
    }

    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
