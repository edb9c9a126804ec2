//! Plan state management
//!
//! The PlanManager actor owns the plan store and serializes task building
//! (begin/add/end) and plan status changes. Successful `end` and status
//! changes are announced to front-ends through the bridge.

mod manager;
mod messages;

pub use manager::PlanManager;
pub use messages::{PlanCommand, PlanError, PlanResponse};
