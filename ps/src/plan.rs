//! Plan domain types
//!
//! A plan is one batch of proposed media file operations plus its approval
//! status. The JSON layout of [`Plan`] is the on-disk file format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EntryKindMismatch, InvalidTransition, ParseError};
use crate::path::to_posix;

/// Which kind of operation every entry of a plan performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanKind {
    /// Entries are `{from, to}` renames
    RenameMediaFile,
    /// Entries assign a local file to a season/episode
    RecognizeMediaFile,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RenameMediaFile => "rename-media-file",
            Self::RecognizeMediaFile => "recognize-media-file",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rename-media-file" => Ok(Self::RenameMediaFile),
            "recognize-media-file" => Ok(Self::RecognizeMediaFile),
            other => Err(ParseError {
                what: "plan kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Approval status of a plan
///
/// `Pending` is the only non-terminal state. A plan leaves it exactly once,
/// to either `Completed` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Staged, awaiting a decision
    #[default]
    Pending,
    /// Approved and handed to the executor
    Completed,
    /// Declined by the reviewer
    Rejected,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// True for `Completed` and `Rejected`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Validate a move from `self` to `next`
    pub fn transition(self, next: PlanStatus) -> Result<PlanStatus, InvalidTransition> {
        match (self, next) {
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Rejected) => Ok(next),
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            other => Err(ParseError {
                what: "plan status",
                value: other.to_string(),
            }),
        }
    }
}

/// Rename one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameEntry {
    pub from: String,
    pub to: String,
}

/// Assign a local file to a season and episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionEntry {
    pub season: u32,
    pub episode: u32,
    pub path: String,
}

/// One unit of proposed work inside a plan
///
/// Stored without a tag; the two variants have disjoint field sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Rename(RenameEntry),
    Recognition(RecognitionEntry),
}

impl Entry {
    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Rename(RenameEntry {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn recognition(season: u32, episode: u32, path: impl Into<String>) -> Self {
        Self::Recognition(RecognitionEntry {
            season,
            episode,
            path: path.into(),
        })
    }

    /// The plan kind this entry belongs in
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Rename(_) => PlanKind::RenameMediaFile,
            Self::Recognition(_) => PlanKind::RecognizeMediaFile,
        }
    }

    /// Same entry with every path in canonical POSIX form
    pub fn normalized(self) -> Self {
        match self {
            Self::Rename(RenameEntry { from, to }) => Self::Rename(RenameEntry {
                from: to_posix(&from),
                to: to_posix(&to),
            }),
            Self::Recognition(RecognitionEntry { season, episode, path }) => Self::Recognition(RecognitionEntry {
                season,
                episode,
                path: to_posix(&path),
            }),
        }
    }
}

/// Durable record of a batch of entries and its approval status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Plan id, distinct from the task id that names the file
    pub id: String,

    #[serde(rename = "task")]
    pub kind: PlanKind,

    pub status: PlanStatus,

    /// Folder the plan operates in (POSIX form)
    pub media_folder_path: String,

    /// Entries in insertion order
    #[serde(default)]
    pub files: Vec<Entry>,
}

impl Plan {
    /// Create an empty pending plan with a fresh id
    pub fn new(kind: PlanKind, media_folder_path: &str) -> Self {
        Self {
            id: generate_id(),
            kind,
            status: PlanStatus::Pending,
            media_folder_path: to_posix(media_folder_path),
            files: Vec::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PlanStatus::Pending
    }

    /// Append an entry, normalizing its paths
    pub fn push(&mut self, entry: Entry) -> Result<(), EntryKindMismatch> {
        if entry.kind() != self.kind {
            return Err(EntryKindMismatch {
                plan: self.kind,
                entry: entry.kind(),
            });
        }
        self.files.push(entry.normalized());
        Ok(())
    }

    /// Move the plan to `next` if the state machine allows it
    pub fn transition(&mut self, next: PlanStatus) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(next)?;
        Ok(())
    }
}

/// Generate a new time-ordered id
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_file_layout() {
        let mut plan = Plan::new(PlanKind::RenameMediaFile, "/media/Show");
        plan.push(Entry::rename("/media/Show/a.mkv", "/media/Show/S01E01.mkv"))
            .unwrap();

        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["task"], "rename-media-file");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["mediaFolderPath"], "/media/Show");
        assert_eq!(
            value["files"],
            json!([{"from": "/media/Show/a.mkv", "to": "/media/Show/S01E01.mkv"}])
        );
    }

    #[test]
    fn test_untagged_entries_deserialize() {
        let json = r#"{
            "id": "plan-1",
            "task": "recognize-media-file",
            "status": "completed",
            "mediaFolderPath": "/media/Show",
            "files": [{"season": 1, "episode": 2, "path": "/media/Show/b.mkv"}]
        }"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.files, vec![Entry::recognition(1, 2, "/media/Show/b.mkv")]);
    }

    #[test]
    fn test_missing_files_defaults_to_empty() {
        let json = r#"{"id":"p","task":"rename-media-file","status":"pending","mediaFolderPath":"/m"}"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert!(plan.files.is_empty());
    }

    #[test]
    fn test_push_rejects_other_kind() {
        let mut plan = Plan::new(PlanKind::RenameMediaFile, "/media/Show");
        let err = plan.push(Entry::recognition(1, 1, "/media/Show/a.mkv")).unwrap_err();
        assert_eq!(err.plan, PlanKind::RenameMediaFile);
        assert_eq!(err.entry, PlanKind::RecognizeMediaFile);
        assert!(plan.files.is_empty());
    }

    #[test]
    fn test_push_normalizes_paths() {
        let mut plan = Plan::new(PlanKind::RecognizeMediaFile, r"C:\Shows\Foo\");
        plan.push(Entry::recognition(2, 5, r"C:\Shows\Foo\ep5.mkv")).unwrap();
        assert_eq!(plan.media_folder_path, "/C/Shows/Foo");
        assert_eq!(plan.files[0], Entry::recognition(2, 5, "/C/Shows/Foo/ep5.mkv"));
    }

    #[test]
    fn test_status_transitions() {
        assert_eq!(
            PlanStatus::Pending.transition(PlanStatus::Completed),
            Ok(PlanStatus::Completed)
        );
        assert_eq!(
            PlanStatus::Pending.transition(PlanStatus::Rejected),
            Ok(PlanStatus::Rejected)
        );
        assert!(PlanStatus::Pending.transition(PlanStatus::Pending).is_err());
        assert!(PlanStatus::Completed.transition(PlanStatus::Rejected).is_err());
        assert!(PlanStatus::Rejected.transition(PlanStatus::Completed).is_err());
    }

    #[test]
    fn test_plan_transition_is_one_shot() {
        let mut plan = Plan::new(PlanKind::RenameMediaFile, "/m");
        plan.transition(PlanStatus::Rejected).unwrap();
        let err = plan.transition(PlanStatus::Completed).unwrap_err();
        assert_eq!(err.from, PlanStatus::Rejected);
        assert_eq!(plan.status, PlanStatus::Rejected);
    }

    #[test]
    fn test_parse_kind_and_status() {
        assert_eq!("recognize-media-file".parse::<PlanKind>(), Ok(PlanKind::RecognizeMediaFile));
        assert_eq!("rejected".parse::<PlanStatus>(), Ok(PlanStatus::Rejected));
        assert!("done".parse::<PlanStatus>().is_err());
    }
}
