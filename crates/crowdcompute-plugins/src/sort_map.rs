//! The *map* half of a distributed sort (`spec.md` §4.2 "Distributed sort").
//! Shards an uploaded file by line count, dispatches one `sort_map` task per
//! chunk, and — once every chunk has reported back — enqueues the matching
//! `sort_reduce` task. Ports `examples/original_source/core/plugins/sort_map.py`.

use crate::shard::{shard_lines, split_keep_newlines};
use async_trait::async_trait;
use crowdcompute_common::{
    param_usize, CompletionContext, ExecuteOutcome, JobState, ParamMap, Plugin, PluginError, Task,
    TaskPayload, TaskingContext,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const JOB_TYPE: &str = "sort_map";

#[derive(Debug, Default)]
pub struct SortMapPlugin;

#[async_trait]
impl Plugin for SortMapPlugin {
    fn job_type(&self) -> &'static str {
        JOB_TYPE
    }

    async fn tasking(
        &self,
        ctx: TaskingContext<'_>,
    ) -> Result<(Vec<TaskPayload>, JobState), PluginError> {
        let upload = ctx
            .upload
            .ok_or_else(|| PluginError::BadSubmission("sort_map requires a file upload".to_string()))?;
        let num_chunks = param_usize(ctx.params, "num_chunks", 10);

        let unsorted_path = ctx.job_dir.join(if upload.filename.is_empty() {
            "UNSORTED.txt".to_string()
        } else {
            upload.filename.clone()
        });
        tokio::fs::write(&unsorted_path, &upload.bytes).await?;

        let lines = split_keep_newlines(&upload.bytes);
        let chunk_paths = shard_lines(&lines, ctx.job_dir, num_chunks).await?;
        if chunk_paths.is_empty() {
            return Err(PluginError::BadSubmission("uploaded file has no lines to sort".to_string()));
        }

        let payloads = chunk_paths
            .iter()
            .map(|chunk_path| {
                let filename = chunk_path.file_name().unwrap().to_string_lossy().to_string();
                let mut input_files = BTreeMap::new();
                input_files.insert(
                    "data".to_string(),
                    format!("{}/data/jobs/{}/{}", ctx.base_url, ctx.job_id, filename),
                );
                TaskPayload {
                    job_type: JOB_TYPE.to_string(),
                    input_files,
                    output_path: String::new(),
                    params: ParamMap::new(),
                }
            })
            .collect::<Vec<_>>();

        let job_state = JobState::new(ctx.job_id.clone(), "sort", payloads.len());
        Ok((payloads, job_state))
    }

    async fn execute(
        &self,
        local_inputs: &HashMap<String, PathBuf>,
        local_output_dir: &Path,
        _params: &ParamMap,
    ) -> Result<ExecuteOutcome, PluginError> {
        let Some(input_path) = local_inputs.get("data") else {
            return Ok(ExecuteOutcome::failure());
        };

        let bytes = tokio::fs::read(input_path).await?;
        let mut lines = split_keep_newlines(&bytes);
        lines.sort();

        let mut sorted = Vec::new();
        for line in lines {
            sorted.extend_from_slice(&line);
        }

        let output_path = local_output_dir.join("sorted_chunk.txt");
        tokio::fs::write(&output_path, sorted).await?;
        Ok(ExecuteOutcome::success(output_path))
    }

    fn on_complete(&self, ctx: CompletionContext<'_>) {
        let job_id = ctx.task.job_id.clone();
        let Some(job) = ctx.jobs.get_mut(&job_id) else {
            return;
        };
        job.completed_tasks += 1;
        tracing::info!(
            %job_id,
            completed = job.completed_tasks,
            total = job.total_tasks,
            "sort_map progress"
        );

        if job.completed_tasks != job.total_tasks {
            return;
        }

        let mut input_files = BTreeMap::new();
        for (i, url) in job.result_urls.iter().enumerate() {
            input_files.insert(format!("chunk_{i}"), url.clone());
        }

        let task_id = crowdcompute_common::TaskId::generate();
        let payload = TaskPayload {
            job_type: crate::sort_reduce::JOB_TYPE.to_string(),
            input_files,
            output_path: format!("{}/upload/{}/{}", ctx.base_url, job_id, task_id),
            params: ParamMap::new(),
        };
        ctx.queue.push_back(Task { task_id, job_id, payload });
    }
}
