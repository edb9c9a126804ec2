//! Error types for the plan store

use std::path::PathBuf;

use thiserror::Error;

use crate::plan::{PlanKind, PlanStatus};

/// Errors from reading or writing plan files
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure while touching a plan file or the store directory
    #[error("Store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A plan file exists but does not parse as a plan
    #[error("Malformed plan file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize plan: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Task ids name files, so they may not be empty or contain separators
    #[error("Invalid task id: {0:?}")]
    InvalidTaskId(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A status change that the plan state machine does not allow
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Cannot move plan from {from} to {to}")]
pub struct InvalidTransition {
    pub from: PlanStatus,
    pub to: PlanStatus,
}

/// An entry was offered to a plan of the other kind
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("A {entry} entry cannot be added to a {plan} plan")]
pub struct EntryKindMismatch {
    pub plan: PlanKind,
    pub entry: PlanKind,
}

/// Unrecognized text for a [`PlanKind`] or [`PlanStatus`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown {what}: {value:?}")]
pub struct ParseError {
    pub what: &'static str,
    pub value: String,
}
