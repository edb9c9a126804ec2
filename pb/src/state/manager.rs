//! PlanManager - actor that owns the plan store
//!
//! All task building and status changes go through one task, so concurrent
//! callers never interleave a read-modify-write of the same plan file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use planstore::path::to_posix;
use planstore::{Entry, Plan, PlanKind, PlanStatus, PlanStore, StoredPlan, generate_id};

use super::messages::{PlanCommand, PlanError, PlanResponse};
use crate::bridge::BridgeHandle;
use crate::events::{PLAN_READY, PLAN_STATUS_CHANGED, PlanReady, PlanStatusChanged};

/// Handle to send commands to the PlanManager
#[derive(Debug, Clone)]
pub struct PlanManager {
    tx: mpsc::Sender<PlanCommand>,
    bridge: BridgeHandle,
}

impl PlanManager {
    /// Spawn a new PlanManager actor over the store at `store_path`
    pub fn spawn(store_path: impl AsRef<Path>, bridge: BridgeHandle) -> Self {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = PlanStore::open(store_path);
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(actor_loop(store, rx));

        info!("PlanManager spawned");
        Self { tx, bridge }
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<PlanResponse<T>>) -> PlanCommand) -> PlanResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| PlanError::ChannelError)?;
        reply_rx.await.map_err(|_| PlanError::ChannelError)?
    }

    /// Push an event to every attached front-end, logging failures
    async fn notify(&self, event: &str, payload: impl Serialize) {
        let data = match serde_json::to_value(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!(%event, error = %e, "notify: failed to encode payload");
                return;
            }
        };
        if let Err(e) = self.bridge.broadcast(event, data, None).await {
            warn!(%event, error = %e, "notify: broadcast failed");
        }
    }

    /// Start staging a plan; returns the new task id
    pub async fn begin(&self, media_folder_path: &str, kind: PlanKind) -> PlanResponse<String> {
        debug!(%media_folder_path, %kind, "begin: called");
        self.call(|reply| PlanCommand::Begin {
            media_folder_path: media_folder_path.to_string(),
            kind,
            reply,
        })
        .await
    }

    /// Append one entry to a staged plan
    pub async fn add(&self, task_id: &str, entry: Entry) -> PlanResponse<()> {
        debug!(%task_id, kind = %entry.kind(), "add: called");
        self.call(|reply| PlanCommand::Add {
            task_id: task_id.to_string(),
            entry,
            reply,
        })
        .await
    }

    /// Finish staging and announce the plan to front-ends
    ///
    /// Returns the path of the plan file.
    pub async fn end(&self, task_id: &str) -> PlanResponse<PathBuf> {
        debug!(%task_id, "end: called");
        let path = self
            .call(|reply| PlanCommand::End {
                task_id: task_id.to_string(),
                reply,
            })
            .await?;

        let ready = PlanReady {
            task_id: task_id.to_string(),
            plan_file_path: to_posix(&path.to_string_lossy()),
        };
        self.notify(PLAN_READY, ready).await;
        Ok(path)
    }

    /// Record the reviewer's decision on a pending plan
    pub async fn update_status(&self, plan_id: &str, status: PlanStatus) -> PlanResponse<StoredPlan> {
        debug!(%plan_id, %status, "update_status: called");
        let stored = self
            .call(|reply| PlanCommand::UpdateStatus {
                plan_id: plan_id.to_string(),
                status,
                reply,
            })
            .await?;

        let changed = PlanStatusChanged {
            plan_id: stored.plan.id.clone(),
            task_id: stored.task_id.clone(),
            status: stored.plan.status,
        };
        self.notify(PLAN_STATUS_CHANGED, changed).await;
        Ok(stored)
    }

    pub async fn get_plan(&self, task_id: &str) -> PlanResponse<Option<Plan>> {
        debug!(%task_id, "get_plan: called");
        self.call(|reply| PlanCommand::GetPlan {
            task_id: task_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn find_plan(&self, plan_id: &str) -> PlanResponse<Option<StoredPlan>> {
        debug!(%plan_id, "find_plan: called");
        self.call(|reply| PlanCommand::FindPlan {
            plan_id: plan_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn list_pending(&self) -> PlanResponse<Vec<StoredPlan>> {
        debug!("list_pending: called");
        self.call(|reply| PlanCommand::ListPending { reply }).await
    }

    pub async fn shutdown(&self) -> PlanResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(PlanCommand::Shutdown)
            .await
            .map_err(|_| PlanError::ChannelError)
    }
}

/// Load the plan for `task_id`, failing if it does not exist or is decided
fn load_pending(store: &PlanStore, task_id: &str) -> PlanResponse<Plan> {
    let plan = store
        .read_plan(task_id)?
        .ok_or_else(|| PlanError::TaskNotFound(task_id.to_string()))?;
    if !plan.is_pending() {
        return Err(PlanError::NotPending {
            task_id: task_id.to_string(),
            status: plan.status,
        });
    }
    Ok(plan)
}

fn begin(store: &mut PlanStore, media_folder_path: &str, kind: PlanKind) -> PlanResponse<String> {
    let task_id = generate_id();
    let plan = Plan::new(kind, media_folder_path);
    store.write_plan(&task_id, &plan)?;
    info!(%task_id, plan_id = %plan.id, %kind, folder = %plan.media_folder_path, "Task started");
    Ok(task_id)
}

fn add(store: &mut PlanStore, task_id: &str, entry: Entry) -> PlanResponse<()> {
    let mut plan = load_pending(store, task_id)?;
    plan.push(entry)?;
    store.write_plan(task_id, &plan)?;
    debug!(%task_id, entries = plan.files.len(), "Entry added");
    Ok(())
}

fn end(store: &PlanStore, task_id: &str) -> PlanResponse<PathBuf> {
    let plan = load_pending(store, task_id)?;
    if plan.files.is_empty() {
        return Err(PlanError::EmptyPlan(task_id.to_string()));
    }
    let path = store.plan_path(task_id)?;
    info!(%task_id, plan_id = %plan.id, entries = plan.files.len(), "Plan ready for review");
    Ok(path)
}

fn update_status(store: &mut PlanStore, plan_id: &str, status: PlanStatus) -> PlanResponse<StoredPlan> {
    let mut stored = store
        .find_by_plan_id(plan_id)?
        .ok_or_else(|| PlanError::PlanNotFound(plan_id.to_string()))?;

    stored
        .plan
        .transition(status)
        .map_err(|e| PlanError::InvalidStateTransition {
            plan_id: plan_id.to_string(),
            current: e.from,
            requested: e.to,
        })?;

    store.write_plan(&stored.task_id, &stored.plan)?;
    info!(%plan_id, task_id = %stored.task_id, %status, "Plan status changed");
    Ok(stored)
}

/// The actor loop that processes commands
async fn actor_loop(mut store: PlanStore, mut rx: mpsc::Receiver<PlanCommand>) {
    debug!("PlanManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            PlanCommand::Begin {
                media_folder_path,
                kind,
                reply,
            } => {
                debug!(%media_folder_path, "actor_loop: Begin command");
                let _ = reply.send(begin(&mut store, &media_folder_path, kind));
            }

            PlanCommand::Add { task_id, entry, reply } => {
                debug!(%task_id, "actor_loop: Add command");
                let _ = reply.send(add(&mut store, &task_id, entry));
            }

            PlanCommand::End { task_id, reply } => {
                debug!(%task_id, "actor_loop: End command");
                let _ = reply.send(end(&store, &task_id));
            }

            PlanCommand::UpdateStatus { plan_id, status, reply } => {
                debug!(%plan_id, %status, "actor_loop: UpdateStatus command");
                let _ = reply.send(update_status(&mut store, &plan_id, status));
            }

            PlanCommand::GetPlan { task_id, reply } => {
                debug!(%task_id, "actor_loop: GetPlan command");
                let _ = reply.send(store.read_plan(&task_id).map_err(PlanError::from));
            }

            PlanCommand::FindPlan { plan_id, reply } => {
                debug!(%plan_id, "actor_loop: FindPlan command");
                let _ = reply.send(store.find_by_plan_id(&plan_id).map_err(PlanError::from));
            }

            PlanCommand::ListPending { reply } => {
                debug!("actor_loop: ListPending command");
                let _ = reply.send(store.list_pending().map_err(PlanError::from));
            }

            PlanCommand::Shutdown => {
                info!("PlanManager shutting down");
                break;
            }
        }
    }

    debug!("PlanManager actor stopped");
}
