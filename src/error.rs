//! Error types for mapping construction
//!
//! Runtime collaborator failures travel as `anyhow::Error`; everything that can
//! be rejected while a mapping is being built is a [`MappingError`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Invalid group: {0}")]
    InvalidGroup(String),

    #[error("Invalid group target: {0}")]
    InvalidGroupTarget(String),

    #[error("Group {group} has no deck to derive '{target}' from")]
    NoDeck { group: String, target: String },

    #[error("Shift levels must not be empty")]
    NoLevels,

    #[error("Invalid shift level name '{0}'")]
    InvalidLevel(String),

    #[error("Duplicate shift level '{0}'")]
    DuplicateLevel(String),

    #[error("Unknown shift level '{0}'")]
    UnknownLevel(String),

    #[error("Invalid encoder config for '{key}': {reason}")]
    InvalidEncoder { key: String, reason: String },

    #[error("Invalid feedback binding: {0}")]
    InvalidFeedback(String),
}
