//! PlanStore - durable staging area for media file plans
//!
//! Each plan is one JSON document named after the task that staged it. The
//! files are the source of truth: nothing is cached between calls except an
//! index from plan id to task id, which is verified before use.
//!
//! # Layout
//!
//! ```text
//! plans/
//! ├── {task_id}.json    # { id, task, status, mediaFolderPath, files }
//! └── ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use planstore::{Entry, Plan, PlanKind, PlanStore};
//!
//! let mut store = PlanStore::open("plans");
//! let mut plan = Plan::new(PlanKind::RenameMediaFile, "/media/Show");
//! plan.push(Entry::rename("/media/Show/a.mkv", "/media/Show/S01E01.mkv"))?;
//! store.write_plan("task-1", &plan)?;
//! let found = store.find_by_plan_id(&plan.id)?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod path;
mod plan;
mod store;

pub use error::{EntryKindMismatch, InvalidTransition, ParseError, StoreError};
pub use plan::{Entry, Plan, PlanKind, PlanStatus, RecognitionEntry, RenameEntry, generate_id};
pub use store::{PlanStore, StoredPlan};
