//! Distributed wordlist password cracking with a kill-switch (`spec.md`
//! §4.2 "Hash-crack"). Ports
//! `examples/original_source/core/plugins/hashcat.py`, with the actual crack
//! done by a local pure-Rust hash check rather than spawning a containerized
//! `hashcat` binary — the concrete cracking backend is explicitly out of
//! scope, only the plugin/engine interface is specified.

use crate::shard::{shard_lines, split_keep_newlines};
use async_trait::async_trait;
use crowdcompute_common::{
    param_string, param_usize, CompletionContext, ExecuteOutcome, JobState, ParamMap, ParamValue,
    Plugin, PluginError, TaskPayload, TaskingContext,
};
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const JOB_TYPE: &str = "hashcat_crack";

#[derive(Debug, Default)]
pub struct HashcatCrackPlugin;

#[async_trait]
impl Plugin for HashcatCrackPlugin {
    fn job_type(&self) -> &'static str {
        JOB_TYPE
    }

    async fn tasking(
        &self,
        ctx: TaskingContext<'_>,
    ) -> Result<(Vec<TaskPayload>, JobState), PluginError> {
        let upload = ctx.upload.ok_or_else(|| {
            PluginError::BadSubmission("hashcat_crack requires a wordlist file upload".to_string())
        })?;
        let target_hash = param_string(ctx.params, "target_hash")
            .ok_or_else(|| PluginError::BadSubmission("missing parameter: target_hash".to_string()))?;
        let hash_mode = param_string(ctx.params, "hash_mode").unwrap_or_else(|| "0".to_string());
        let num_chunks = param_usize(ctx.params, "num_chunks", 5);

        let wordlist_path = ctx.job_dir.join("wordlist.txt");
        tokio::fs::write(&wordlist_path, &upload.bytes).await?;

        let lines = split_keep_newlines(&upload.bytes);
        let chunk_paths = shard_lines(&lines, ctx.job_dir, num_chunks).await?;

        let payloads = chunk_paths
            .iter()
            .map(|chunk_path| {
                let filename = chunk_path.file_name().unwrap().to_string_lossy().to_string();
                let mut input_files = BTreeMap::new();
                input_files.insert(
                    "wordlist_chunk".to_string(),
                    format!("{}/data/jobs/{}/{}", ctx.base_url, ctx.job_id, filename),
                );
                let mut params = ParamMap::new();
                params.insert("target_hash".to_string(), ParamValue::String(target_hash.clone()));
                params.insert("hash_mode".to_string(), ParamValue::String(hash_mode.clone()));
                TaskPayload {
                    job_type: JOB_TYPE.to_string(),
                    input_files,
                    output_path: String::new(),
                    params,
                }
            })
            .collect::<Vec<_>>();

        let mut job_state = JobState::new(ctx.job_id.clone(), "hashcat", payloads.len());
        job_state.status = Some("running".to_string());
        Ok((payloads, job_state))
    }

    async fn execute(
        &self,
        local_inputs: &HashMap<String, PathBuf>,
        local_output_dir: &Path,
        params: &ParamMap,
    ) -> Result<ExecuteOutcome, PluginError> {
        let Some(wordlist_path) = local_inputs.get("wordlist_chunk") else {
            return Ok(ExecuteOutcome::failure());
        };
        let target_hash = param_string(params, "target_hash")
            .ok_or_else(|| PluginError::Other("task missing target_hash param".to_string()))?;
        let hash_mode = param_string(params, "hash_mode").unwrap_or_else(|| "0".to_string());

        let bytes = tokio::fs::read(wordlist_path).await?;
        let content = String::from_utf8_lossy(&bytes);

        for word in content.lines() {
            if hash_matches(word, &hash_mode, &target_hash) {
                let output_path = local_output_dir.join("cracked.txt");
                tokio::fs::write(&output_path, word).await?;
                return Ok(ExecuteOutcome::success(output_path));
            }
        }

        Ok(ExecuteOutcome::success_without_artifact())
    }

    fn on_complete(&self, ctx: CompletionContext<'_>) {
        let job_id = ctx.task.job_id.clone();
        let Some(job) = ctx.jobs.get_mut(&job_id) else {
            return;
        };
        job.completed_tasks += 1;

        if job.result_urls.is_empty() {
            return;
        }

        tracing::info!(%job_id, "password found, initiating kill switch");
        job.status = Some("cracked".to_string());
        let purged = ctx.purge_pending_for_job(&job_id);
        tracing::info!(%job_id, purged, "cancelled pending hashcat tasks");
    }
}

fn hash_matches(word: &str, hash_mode: &str, target_hash: &str) -> bool {
    let digest_hex = match hash_mode {
        "100" => {
            let mut hasher = Sha1::new();
            hasher.update(word.as_bytes());
            hex::encode(hasher.finalize())
        }
        "1400" => {
            let mut hasher = Sha256::new();
            hasher.update(word.as_bytes());
            hex::encode(hasher.finalize())
        }
        _ => {
            let mut hasher = Md5::new();
            hasher.update(word.as_bytes());
            hex::encode(hasher.finalize())
        }
    };
    digest_hex.eq_ignore_ascii_case(target_hash)
}
