//! Plan manager messages
//!
//! Commands and responses for the actor pattern.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::oneshot;

use planstore::{Entry, EntryKindMismatch, Plan, PlanKind, PlanStatus, StoreError, StoredPlan};

/// Errors from plan operations
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// `end` was called on a task with no entries
    #[error("Task {0} has no entries")]
    EmptyPlan(String),

    /// The task's plan has already been decided
    #[error("Task {task_id} is {status}, entries can no longer change")]
    NotPending { task_id: String, status: PlanStatus },

    #[error("Cannot move plan {plan_id} from {current} to {requested}")]
    InvalidStateTransition {
        plan_id: String,
        current: PlanStatus,
        requested: PlanStatus,
    },

    #[error(transparent)]
    EntryKindMismatch(#[from] EntryKindMismatch),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Channel error")]
    ChannelError,
}

/// Response from plan operations
pub type PlanResponse<T> = Result<T, PlanError>;

/// Commands sent to the PlanManager actor
#[derive(Debug)]
pub enum PlanCommand {
    Begin {
        media_folder_path: String,
        kind: PlanKind,
        reply: oneshot::Sender<PlanResponse<String>>,
    },
    Add {
        task_id: String,
        entry: Entry,
        reply: oneshot::Sender<PlanResponse<()>>,
    },
    End {
        task_id: String,
        reply: oneshot::Sender<PlanResponse<PathBuf>>,
    },
    UpdateStatus {
        plan_id: String,
        status: PlanStatus,
        reply: oneshot::Sender<PlanResponse<StoredPlan>>,
    },
    GetPlan {
        task_id: String,
        reply: oneshot::Sender<PlanResponse<Option<Plan>>>,
    },
    FindPlan {
        plan_id: String,
        reply: oneshot::Sender<PlanResponse<Option<StoredPlan>>>,
    },
    ListPending {
        reply: oneshot::Sender<PlanResponse<Vec<StoredPlan>>>,
    },
    Shutdown,
}
