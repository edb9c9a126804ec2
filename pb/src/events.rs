//! Wire event names and payloads exchanged with front-ends

use serde::{Deserialize, Serialize};

use planstore::PlanStatus;

/// Ask the UI which media folder is selected
pub const GET_SELECTED_MEDIA_METADATA: &str = "getSelectedMediaMetadata";

/// Ask the user a yes/no question
pub const ASK_FOR_CONFIRMATION: &str = "askForConfirmation";

/// A staged plan is ready for review
pub const PLAN_READY: &str = "planReady";

/// A plan was approved or rejected
pub const PLAN_STATUS_CHANGED: &str = "planStatusChanged";

/// Sent to a client right after it attaches
pub const WELCOME: &str = "welcome";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationReply {
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReady {
    pub task_id: String,
    pub plan_file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatusChanged {
    pub plan_id: String,
    pub task_id: String,
    pub status: PlanStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub client_id: String,
}
