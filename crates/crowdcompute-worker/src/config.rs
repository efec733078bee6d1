//! CLI surface for the worker binary (`SPEC_FULL.md` §6). Flags win over a
//! `crowdcompute.toml` file in the current directory, which wins over
//! built-in defaults.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseOnFailure {
    Always,
    Never,
}

#[derive(Debug, Parser)]
#[command(name = "crowdcompute-worker", about = "CrowdCompute compute worker")]
pub struct Cli {
    /// Base URL of the coordinator this worker registers against.
    #[arg(long, env = "COORDINATOR_BASE_URL", alias = "coordinator_url")]
    pub coordinator_url: Option<String>,

    /// Display name advertised at registration.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub cpus: Option<u32>,

    #[arg(long)]
    pub ram_gb: Option<u32>,

    #[arg(long)]
    pub gpus: Option<u32>,

    /// Seconds to sleep between polls when the queue is empty.
    #[arg(long)]
    pub poll_empty_secs: Option<u64>,

    /// Seconds to sleep after releasing a task before polling again.
    #[arg(long)]
    pub poll_busy_secs: Option<u64>,

    /// Whether to release a task after a failed execution (vs. letting the
    /// lease expire for redelivery).
    #[arg(long, value_enum)]
    pub release_on_failure: Option<ReleaseOnFailure>,

    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    coordinator_url: Option<String>,
    name: Option<String>,
    cpus: Option<u32>,
    ram_gb: Option<u32>,
    gpus: Option<u32>,
    poll_empty_secs: Option<u64>,
    poll_busy_secs: Option<u64>,
    release_on_failure: Option<ReleaseOnFailure>,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub coordinator_url: String,
    pub name: String,
    pub cpus: u32,
    pub ram_gb: u32,
    pub gpus: u32,
    pub poll_empty: Duration,
    pub poll_busy: Duration,
    pub release_on_failure: ReleaseOnFailure,
}

impl WorkerConfig {
    pub fn resolve(cli: Cli) -> anyhow::Result<Self> {
        let file = std::fs::read_to_string("crowdcompute.toml")
            .ok()
            .and_then(|s| toml::from_str::<FileConfig>(&s).ok())
            .unwrap_or_default();

        let coordinator_url = cli
            .coordinator_url
            .or(file.coordinator_url)
            .or_else(|| std::env::var("COORDINATOR_URL").ok())
            .unwrap_or_else(|| "http://localhost:8000".to_string());

        let name = cli.name.or(file.name).unwrap_or_else(|| format!("worker-{}", fastrand::u32(..)));

        Ok(Self {
            coordinator_url,
            name,
            cpus: cli.cpus.or(file.cpus).unwrap_or(1),
            ram_gb: cli.ram_gb.or(file.ram_gb).unwrap_or(1),
            gpus: cli.gpus.or(file.gpus).unwrap_or(0),
            poll_empty: Duration::from_secs(cli.poll_empty_secs.or(file.poll_empty_secs).unwrap_or(7)),
            poll_busy: Duration::from_secs(cli.poll_busy_secs.or(file.poll_busy_secs).unwrap_or(2)),
            release_on_failure: cli.release_on_failure.or(file.release_on_failure).unwrap_or(ReleaseOnFailure::Always),
        })
    }
}
