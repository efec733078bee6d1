//! The *reduce* half of a distributed sort. Never accepts direct submission
//! — `sort_map`'s completion hook is the only thing that ever enqueues a
//! `sort_reduce` task. Ports
//! `examples/original_source/core/plugins/sort_reduce.py`.

use crate::shard::split_keep_newlines;
use async_trait::async_trait;
use crowdcompute_common::{
    CompletionContext, ExecuteOutcome, JobState, ParamMap, Plugin, PluginError, TaskPayload,
    TaskingContext,
};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::{Path, PathBuf};

pub const JOB_TYPE: &str = "sort_reduce";

#[derive(Debug, Default)]
pub struct SortReducePlugin;

#[async_trait]
impl Plugin for SortReducePlugin {
    fn job_type(&self) -> &'static str {
        JOB_TYPE
    }

    async fn tasking(
        &self,
        _ctx: TaskingContext<'_>,
    ) -> Result<(Vec<TaskPayload>, JobState), PluginError> {
        Err(PluginError::UnsupportedSubmission(
            "sort_reduce is only ever created by sort_map's completion hook".to_string(),
        ))
    }

    async fn execute(
        &self,
        local_inputs: &HashMap<String, PathBuf>,
        local_output_dir: &Path,
        _params: &ParamMap,
    ) -> Result<ExecuteOutcome, PluginError> {
        if local_inputs.is_empty() {
            return Ok(ExecuteOutcome::failure());
        }

        let mut chunk_paths: Vec<&PathBuf> = local_inputs.values().collect();
        chunk_paths.sort();

        let mut chunks = Vec::with_capacity(chunk_paths.len());
        for path in chunk_paths {
            let bytes = tokio::fs::read(path).await?;
            chunks.push(split_keep_newlines(&bytes));
        }

        let merged = kway_merge(chunks);

        let output_path = local_output_dir.join("FINAL_SORTED.txt");
        let mut contents = Vec::new();
        for line in merged {
            contents.extend_from_slice(&line);
        }
        tokio::fs::write(&output_path, contents).await?;
        Ok(ExecuteOutcome::success(output_path))
    }

    fn on_complete(&self, ctx: CompletionContext<'_>) {
        let job_id = ctx.task.job_id.clone();
        if ctx.jobs.remove(&job_id).is_some() {
            tracing::info!(%job_id, "sort job complete, job state finalized");
        }
    }
}

/// Stable k-way merge over chunks that are each already lexicographically
/// sorted by full line bytes (including the terminator).
fn kway_merge(chunks: Vec<Vec<Vec<u8>>>) -> Vec<Vec<u8>> {
    let mut cursors: Vec<(Vec<Vec<u8>>, usize)> = chunks.into_iter().map(|c| (c, 0)).collect();
    let mut heap: BinaryHeap<Reverse<(Vec<u8>, usize)>> = BinaryHeap::new();

    for (i, (lines, cursor)) in cursors.iter().enumerate() {
        if let Some(line) = lines.get(*cursor) {
            heap.push(Reverse((line.clone(), i)));
        }
    }

    let mut merged = Vec::new();
    while let Some(Reverse((line, i))) = heap.pop() {
        merged.push(line);
        let (lines, cursor) = &mut cursors[i];
        *cursor += 1;
        if let Some(next) = lines.get(*cursor) {
            heap.push(Reverse((next.clone(), i)));
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_merges_pre_sorted_chunks_into_lex_order() {
        let plugin = SortReducePlugin;
        let dir = tempfile::tempdir().unwrap();

        let chunk0 = dir.path().join("chunk_0.txt");
        let chunk1 = dir.path().join("chunk_1.txt");
        tokio::fs::write(&chunk0, b"apple\nbanana\norange\nzebra\n").await.unwrap();
        tokio::fs::write(&chunk1, b"grape\nkiwi\n").await.unwrap();

        let mut inputs = HashMap::new();
        inputs.insert("chunk_0".to_string(), chunk0);
        inputs.insert("chunk_1".to_string(), chunk1);

        let outcome = plugin.execute(&inputs, dir.path(), &ParamMap::new()).await.unwrap();
        assert!(outcome.ok);
        let result = tokio::fs::read_to_string(outcome.result_path.unwrap()).await.unwrap();
        assert_eq!(result, "apple\nbanana\ngrape\nkiwi\norange\nzebra\n");
    }

    #[tokio::test]
    async fn submitting_directly_is_refused() {
        let plugin = SortReducePlugin;
        let dir = tempfile::tempdir().unwrap();
        let job_id = crowdcompute_common::JobId::from("sort_reduce:cccccccc");
        let ctx = TaskingContext {
            job_id: &job_id,
            job_dir: dir.path(),
            base_url: "http://localhost:8000",
            upload: None,
            params: &ParamMap::new(),
        };
        let err = plugin.tasking(ctx).await.unwrap_err();
        assert!(matches!(err, PluginError::UnsupportedSubmission(_)));
    }
}
