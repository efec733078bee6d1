//! Wire and bookkeeping types for the coordinator/worker protocol.
//!
//! These mirror the Pydantic models in the Python prototype's
//! `core/common/schema.py` one for one: `Capabilities`, `TaskPayload`,
//! `Task`. `JobState` is the Rust rendering of the free-form `job_status`
//! dict the prototype's plugins read and write.

use crate::ids::{JobId, TaskId, WorkerId};
use crate::params::ParamMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub cpus: u32,
    pub ram_gb: u32,
    pub gpus: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub name: String,
    pub capabilities: Capabilities,
}

/// A task's input/output wiring and opaque plugin parameters.
///
/// `output_path` is a placeholder when a plugin's `tasking` fn returns it;
/// the engine overwrites it with the canonical
/// `{base_url}/upload/{job_id}/{task_id}` URL before the task is queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub job_type: String,
    pub input_files: BTreeMap<String, String>,
    pub output_path: String,
    pub params: ParamMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub job_id: JobId,
    pub payload: TaskPayload,
}

/// Per-job bookkeeping, owned by the engine but mutated through plugin hooks.
///
/// `total_tasks`/`completed_tasks`/`result_urls` are the fields every
/// reference plugin needs; `status` and `extra` carry whatever else a
/// plugin wants to track (e.g. hashcat's `cracked_password`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: JobId,
    pub job_type: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    #[serde(default)]
    pub result_urls: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobState {
    pub fn new(job_id: JobId, job_type: impl Into<String>, total_tasks: usize) -> Self {
        Self {
            job_id,
            job_type: job_type.into(),
            total_tasks,
            completed_tasks: 0,
            result_urls: Vec::new(),
            status: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseView {
    pub task: Task,
    pub worker_id: WorkerId,
    pub lease_expires: chrono::DateTime<chrono::Utc>,
}
