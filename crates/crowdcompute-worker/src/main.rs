mod client;
mod config;

use client::CoordinatorClient;
use config::{Cli, ReleaseOnFailure, WorkerConfig};
use clap::Parser;
use crowdcompute_common::{Capabilities, Task, WorkerId};
use crowdcompute_engine::PluginRegistry;
use crowdcompute_plugins::all_plugins;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// The worker only ever calls `execute`, but it reuses the coordinator's
/// `PluginRegistry` rather than rolling its own map — same `job_type ->
/// plugin` shape, no reason to duplicate it.
fn build_registry() -> PluginRegistry {
    all_plugins().into_iter().collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbose;
    let config = WorkerConfig::resolve(cli)?;

    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();

    let registry = build_registry();
    let client = CoordinatorClient::new(config.coordinator_url.clone());

    let capabilities = Capabilities { cpus: config.cpus, ram_gb: config.ram_gb, gpus: config.gpus };
    let worker_id = client.register(&config.name, capabilities).await?;
    tracing::info!(%worker_id, name = %config.name, coordinator = %config.coordinator_url, "registered with coordinator");

    loop {
        match client.get_task(&worker_id).await {
            Ok(Some(task)) => {
                run_task(&client, &registry, &worker_id, task, &config).await;
                tokio::time::sleep(config.poll_busy).await;
            }
            Ok(None) => {
                tokio::time::sleep(config.poll_empty).await;
            }
            Err(err) => {
                tracing::error!(error = %err, "polling coordinator failed");
                tokio::time::sleep(config.poll_empty).await;
            }
        }
    }
}

async fn run_task(
    client: &CoordinatorClient,
    registry: &crowdcompute_engine::PluginRegistry,
    worker_id: &WorkerId,
    task: Task,
    config: &WorkerConfig,
) {
    let scratch = scratch_dir(&task.task_id);
    if let Err(err) = tokio::fs::create_dir_all(&scratch).await {
        tracing::error!(task_id = %task.task_id, error = %err, "failed to create scratch directory");
        return;
    }

    let outcome = execute_task(client, registry, &task, &scratch).await;
    let _ = tokio::fs::remove_dir_all(&scratch).await;

    match outcome {
        TaskOutcome::DownloadFailed(err) => {
            tracing::error!(task_id = %task.task_id, error = %err, "input download failed, leaving lease to expire");
        }
        TaskOutcome::NoPlugin => {
            tracing::error!(task_id = %task.task_id, job_type = %task.payload.job_type, "no plugin registered for job type, leaving lease to expire");
        }
        TaskOutcome::Success { uploaded } => {
            if !uploaded {
                tracing::warn!(task_id = %task.task_id, "result upload failed, releasing anyway");
            }
            release(client, worker_id, &task).await;
        }
        TaskOutcome::ExecutionFailed => {
            tracing::warn!(task_id = %task.task_id, "plugin execution failed");
            if config.release_on_failure == ReleaseOnFailure::Always {
                release(client, worker_id, &task).await;
            }
        }
    }
}

enum TaskOutcome {
    DownloadFailed(client::ClientError),
    NoPlugin,
    Success { uploaded: bool },
    ExecutionFailed,
}

async fn execute_task(
    client: &CoordinatorClient,
    registry: &crowdcompute_engine::PluginRegistry,
    task: &Task,
    scratch: &Path,
) -> TaskOutcome {
    let mut local_inputs = HashMap::new();
    for (name, url) in &task.payload.input_files {
        let dest = scratch.join(name);
        if let Err(err) = client.download(url, &dest).await {
            return TaskOutcome::DownloadFailed(err);
        }
        local_inputs.insert(name.clone(), dest);
    }

    let Some(plugin) = registry.get(&task.payload.job_type) else {
        return TaskOutcome::NoPlugin;
    };

    match plugin.execute(&local_inputs, scratch, &task.payload.params).await {
        Ok(outcome) if outcome.ok => {
            let uploaded = match &outcome.result_path {
                Some(path) => client.upload_result(&task.payload.output_path, path).await.is_ok(),
                None => true,
            };
            TaskOutcome::Success { uploaded }
        }
        Ok(_) => TaskOutcome::ExecutionFailed,
        Err(err) => {
            tracing::error!(task_id = %task.task_id, error = %err, "plugin execute returned an error");
            TaskOutcome::ExecutionFailed
        }
    }
}

async fn release(client: &CoordinatorClient, worker_id: &WorkerId, task: &Task) {
    if let Err(err) = client.release_task(worker_id, &task.task_id).await {
        tracing::error!(task_id = %task.task_id, error = %err, "release_task failed");
    }
}

fn scratch_dir(task_id: &crowdcompute_common::TaskId) -> PathBuf {
    std::env::temp_dir().join("crowdcompute-worker").join(task_id.as_str())
}
