//! Core PlanStore implementation

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::plan::{Plan, PlanStatus};

/// File extension of plan documents
const PLAN_EXTENSION: &str = "json";

/// A plan together with the task id and file it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPlan {
    pub task_id: String,
    pub path: PathBuf,
    pub plan: Plan,
}

/// Directory of plan files, one JSON document per task id
///
/// The directory is created on the first write. Besides the files the store
/// keeps a `plan id -> task id` index so status lookups by plan id rarely
/// need a full scan; the files stay the source of truth and a stale index
/// entry is verified and corrected on use.
#[derive(Debug)]
pub struct PlanStore {
    base_path: PathBuf,
    index: HashMap<String, String>,
}

impl PlanStore {
    /// Open a store rooted at `path` without touching the filesystem
    pub fn open(path: impl AsRef<Path>) -> Self {
        let base_path = path.as_ref().to_path_buf();
        debug!(?base_path, "Opened plan store");
        Self {
            base_path,
            index: HashMap::new(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the file holding the plan for `task_id`
    pub fn plan_path(&self, task_id: &str) -> Result<PathBuf, StoreError> {
        validate_task_id(task_id)?;
        Ok(self.base_path.join(format!("{}.{}", task_id, PLAN_EXTENSION)))
    }

    /// Serialize `plan` and atomically replace the file for `task_id`
    ///
    /// The document is written to a temporary file in the same directory and
    /// renamed over the target, so readers never observe a partial plan.
    pub fn write_plan(&mut self, task_id: &str, plan: &Plan) -> Result<PathBuf, StoreError> {
        let path = self.plan_path(task_id)?;
        debug!(%task_id, plan_id = %plan.id, status = %plan.status, entries = plan.files.len(), "write_plan: called");

        fs::create_dir_all(&self.base_path).map_err(|e| StoreError::io(&self.base_path, e))?;

        let mut content = serde_json::to_string_pretty(plan).map_err(StoreError::Serialize)?;
        content.push('\n');

        let mut tmp = NamedTempFile::new_in(&self.base_path).map_err(|e| StoreError::io(&self.base_path, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| StoreError::io(tmp.path().to_path_buf(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(tmp.path().to_path_buf(), e))?;
        tmp.persist(&path).map_err(|e| StoreError::io(&path, e.error))?;

        self.index.insert(plan.id.clone(), task_id.to_string());
        Ok(path)
    }

    /// Read the plan for `task_id`, or `None` if no file exists
    pub fn read_plan(&self, task_id: &str) -> Result<Option<Plan>, StoreError> {
        let path = self.plan_path(task_id)?;
        debug!(%task_id, "read_plan: called");
        read_plan_file(&path)
    }

    /// Read every plan in the store
    ///
    /// Files that cannot be read or parsed are skipped with a warning. Results
    /// are ordered by task id. The plan id index is rebuilt from the scan.
    pub fn scan_all(&mut self) -> Result<Vec<StoredPlan>, StoreError> {
        debug!(base_path = ?self.base_path, "scan_all: called");
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("scan_all: store directory does not exist yet");
                self.index.clear();
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(&self.base_path, e)),
        };

        let mut plans = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.base_path, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PLAN_EXTENSION) {
                continue;
            }
            let Some(task_id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            match read_plan_file(&path) {
                Ok(Some(plan)) => plans.push(StoredPlan { task_id, path, plan }),
                // Removed between read_dir and read
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable plan file"),
            }
        }

        plans.sort_by(|a, b| a.task_id.cmp(&b.task_id));

        self.index = plans
            .iter()
            .map(|stored| (stored.plan.id.clone(), stored.task_id.clone()))
            .collect();

        info!(count = plans.len(), "Scanned plan store");
        Ok(plans)
    }

    /// Find the plan whose `id` is `plan_id`
    pub fn find_by_plan_id(&mut self, plan_id: &str) -> Result<Option<StoredPlan>, StoreError> {
        debug!(%plan_id, "find_by_plan_id: called");

        if let Some(task_id) = self.index.get(plan_id).cloned() {
            let path = self.plan_path(&task_id)?;
            match read_plan_file(&path) {
                Ok(Some(plan)) if plan.id == plan_id => {
                    debug!(%plan_id, %task_id, "find_by_plan_id: index hit");
                    return Ok(Some(StoredPlan { task_id, path, plan }));
                }
                Ok(_) => debug!(%plan_id, %task_id, "find_by_plan_id: stale index entry"),
                Err(e) => warn!(error = %e, %plan_id, "find_by_plan_id: indexed file unreadable"),
            }
            self.index.remove(plan_id);
        }

        Ok(self.scan_all()?.into_iter().find(|stored| stored.plan.id == plan_id))
    }

    /// All plans still awaiting a decision
    pub fn list_pending(&mut self) -> Result<Vec<StoredPlan>, StoreError> {
        self.list_by_status(PlanStatus::Pending)
    }

    /// All plans with the given status
    pub fn list_by_status(&mut self, status: PlanStatus) -> Result<Vec<StoredPlan>, StoreError> {
        debug!(%status, "list_by_status: called");
        Ok(self
            .scan_all()?
            .into_iter()
            .filter(|stored| stored.plan.status == status)
            .collect())
    }
}

fn read_plan_file(path: &Path) -> Result<Option<Plan>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

fn validate_task_id(task_id: &str) -> Result<(), StoreError> {
    let invalid = task_id.is_empty()
        || task_id == "."
        || task_id == ".."
        || task_id.contains(['/', '\\'])
        || task_id.contains('\0');
    if invalid {
        return Err(StoreError::InvalidTaskId(task_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Entry, PlanKind, generate_id};
    use tempfile::TempDir;

    fn staged_plan() -> Plan {
        let mut plan = Plan::new(PlanKind::RenameMediaFile, "/media/Show");
        plan.push(Entry::rename("/media/Show/a.mkv", "/media/Show/S01E01.mkv"))
            .unwrap();
        plan
    }

    #[test]
    fn test_directory_created_lazily() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("plans");
        let mut store = PlanStore::open(&dir);
        assert!(!dir.exists());

        assert!(store.scan_all().unwrap().is_empty());
        assert!(!dir.exists());

        store.write_plan("task-1", &staged_plan()).unwrap();
        assert!(dir.join("task-1.json").exists());
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let mut store = PlanStore::open(temp.path());
        let plan = staged_plan();

        let path = store.write_plan("task-1", &plan).unwrap();
        assert_eq!(path, temp.path().join("task-1.json"));
        assert_eq!(store.read_plan("task-1").unwrap(), Some(plan));
    }

    #[test]
    fn test_read_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let store = PlanStore::open(temp.path());
        assert_eq!(store.read_plan("nope").unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let temp = TempDir::new().unwrap();
        let mut store = PlanStore::open(temp.path());
        let mut plan = staged_plan();
        store.write_plan("task-1", &plan).unwrap();

        plan.push(Entry::rename("/media/Show/b.mkv", "/media/Show/S01E02.mkv"))
            .unwrap();
        store.write_plan("task-1", &plan).unwrap();

        let read = store.read_plan("task-1").unwrap().unwrap();
        assert_eq!(read.files.len(), 2);
        // No temp files left behind
        let leftovers: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_read_malformed_is_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("bad.json"), "{ not json").unwrap();
        let store = PlanStore::open(temp.path());
        assert!(matches!(store.read_plan("bad"), Err(StoreError::Malformed { .. })));
    }

    #[test]
    fn test_scan_skips_corrupt_and_foreign_files() {
        let temp = TempDir::new().unwrap();
        let mut store = PlanStore::open(temp.path());
        store.write_plan("good", &staged_plan()).unwrap();
        fs::write(temp.path().join("bad.json"), "{\"id\": 3}").unwrap();
        fs::write(temp.path().join("notes.txt"), "ignore me").unwrap();

        let plans = store.scan_all().unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].task_id, "good");
    }

    #[test]
    fn test_find_by_plan_id_uses_and_repairs_index() {
        let temp = TempDir::new().unwrap();
        let mut store = PlanStore::open(temp.path());
        let plan = staged_plan();
        store.write_plan("task-1", &plan).unwrap();

        let found = store.find_by_plan_id(&plan.id).unwrap().unwrap();
        assert_eq!(found.task_id, "task-1");

        // A second store instance has an empty index and must fall back to a scan
        let mut fresh = PlanStore::open(temp.path());
        let found = fresh.find_by_plan_id(&plan.id).unwrap().unwrap();
        assert_eq!(found.plan, plan);

        // Move the plan under another task id; the old index entry is stale
        fs::remove_file(temp.path().join("task-1.json")).unwrap();
        let mut moved = PlanStore::open(temp.path());
        moved.write_plan("task-2", &plan).unwrap();
        let found = store.find_by_plan_id(&plan.id).unwrap().unwrap();
        assert_eq!(found.task_id, "task-2");

        assert!(store.find_by_plan_id(&generate_id()).unwrap().is_none());
    }

    #[test]
    fn test_list_pending() {
        let temp = TempDir::new().unwrap();
        let mut store = PlanStore::open(temp.path());
        let pending = staged_plan();
        let mut done = staged_plan();
        done.transition(PlanStatus::Completed).unwrap();
        store.write_plan("a", &pending).unwrap();
        store.write_plan("b", &done).unwrap();

        let listed = store.list_pending().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].plan.id, pending.id);
        assert_eq!(store.list_by_status(PlanStatus::Completed).unwrap()[0].task_id, "b");
    }

    #[test]
    fn test_invalid_task_ids() {
        let temp = TempDir::new().unwrap();
        let mut store = PlanStore::open(temp.path());
        for bad in ["", "..", "a/b", r"a\b"] {
            assert!(matches!(
                store.write_plan(bad, &staged_plan()),
                Err(StoreError::InvalidTaskId(_))
            ));
        }
    }
}
