//! The three-function plugin contract (`spec.md` §4.2): `tasking`,
//! `execute`, `on_complete`. A plugin is a `job_type` plus these three
//! operations; it never holds engine state between calls — each call
//! receives explicit handles for its duration only.

use crate::ids::JobId;
use crate::model::{JobState, Task, TaskPayload};
use crate::params::ParamMap;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("bad submission: {0}")]
    BadSubmission(String),

    #[error("plugin does not support direct submission: {0}")]
    UnsupportedSubmission(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("plugin error: {0}")]
    Other(String),
}

/// An optional file uploaded alongside a job submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Everything `tasking` needs to shard a submission into initial tasks.
pub struct TaskingContext<'a> {
    pub job_id: &'a JobId,
    /// Local directory on the coordinator the plugin may write shards into;
    /// files placed here become downloadable at `{base_url}/data/jobs/{job_id}/...`.
    pub job_dir: &'a Path,
    pub base_url: &'a str,
    pub upload: Option<UploadedFile>,
    pub params: &'a ParamMap,
}

/// What `execute` produced on the worker.
pub struct ExecuteOutcome {
    pub ok: bool,
    /// `None` means "no artifact to upload but the task is considered done".
    pub result_path: Option<PathBuf>,
}

impl ExecuteOutcome {
    pub fn success(result_path: PathBuf) -> Self {
        Self { ok: true, result_path: Some(result_path) }
    }

    pub fn success_without_artifact() -> Self {
        Self { ok: true, result_path: None }
    }

    pub fn failure() -> Self {
        Self { ok: false, result_path: None }
    }
}

/// Everything `on_complete` needs after a task releases.
///
/// Borrowed for the duration of the call only — plugins cannot stash these
/// handles, which is what keeps the engine's single-mutex model sound.
pub struct CompletionContext<'a> {
    pub task: &'a Task,
    pub jobs: &'a mut HashMap<JobId, JobState>,
    pub queue: &'a mut VecDeque<Task>,
    pub base_url: &'a str,
}

impl CompletionContext<'_> {
    /// The kill-switch primitive: drop every queued task belonging to
    /// `job_id`, returning how many were removed.
    pub fn purge_pending_for_job(&mut self, job_id: &JobId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|t| &t.job_id != job_id);
        before - self.queue.len()
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn job_type(&self) -> &'static str;

    /// Handles job submission: shard the upload (if any) into `ctx.job_dir`,
    /// return the initial task payloads and the job's starting bookkeeping
    /// state. `output_path` on each returned payload is a placeholder — the
    /// engine rewrites it to the canonical upload URL before enqueuing.
    async fn tasking(
        &self,
        ctx: TaskingContext<'_>,
    ) -> Result<(Vec<TaskPayload>, JobState), PluginError>;

    /// Runs on the worker. `local_inputs` maps each `input_files` name to the
    /// path it was downloaded to; the plugin writes its result under
    /// `local_output_dir`.
    async fn execute(
        &self,
        local_inputs: &HashMap<String, PathBuf>,
        local_output_dir: &Path,
        params: &ParamMap,
    ) -> Result<ExecuteOutcome, PluginError>;

    /// Runs on the coordinator after a task releases. May update its job's
    /// state, enqueue follow-up tasks, purge pending tasks (kill-switch), or
    /// remove the job's state entirely to finalize it.
    fn on_complete(&self, ctx: CompletionContext<'_>);
}
