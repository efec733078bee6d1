//! CLI surface for the coordinator binary. Flags win over a
//! `crowdcompute.toml` file in the current directory, which wins over
//! built-in defaults (`SPEC_FULL.md` §6), the same layering `zeroclaw` uses
//! for its own TOML config.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "crowdcompute-coordinator", about = "CrowdCompute scheduling coordinator")]
pub struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long)]
    pub bind: Option<String>,

    /// Root directory backing the artifact store.
    #[arg(long)]
    pub storage_root: Option<PathBuf>,

    /// Lease duration in seconds.
    #[arg(long)]
    pub lease_seconds: Option<u64>,

    /// How often the background reclaimer sweeps for expired leases, in milliseconds.
    #[arg(long)]
    pub reclaim_interval_ms: Option<u64>,

    /// Externally reachable base URL advertised in task payloads and upload links.
    #[arg(long, env = "COORDINATOR_BASE_URL")]
    pub base_url: Option<String>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<String>,
    storage_root: Option<PathBuf>,
    lease_seconds: Option<u64>,
    reclaim_interval_ms: Option<u64>,
    base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub bind: String,
    pub storage_root: PathBuf,
    pub lease_seconds: u64,
    pub reclaim_interval: Duration,
    pub base_url: String,
}

impl CoordinatorConfig {
    /// Resolves CLI flags over `./crowdcompute.toml` over built-in defaults.
    pub fn resolve(cli: Cli) -> Self {
        let file = std::fs::read_to_string("crowdcompute.toml")
            .ok()
            .and_then(|s| toml::from_str::<FileConfig>(&s).ok())
            .unwrap_or_default();

        let bind = cli.bind.or(file.bind).unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let storage_root =
            cli.storage_root.or(file.storage_root).unwrap_or_else(|| PathBuf::from("file_storage"));
        let lease_seconds = cli.lease_seconds.or(file.lease_seconds).unwrap_or(15);
        let reclaim_interval_ms = cli.reclaim_interval_ms.or(file.reclaim_interval_ms).unwrap_or(1000);
        let base_url =
            cli.base_url.or(file.base_url).unwrap_or_else(|| "http://localhost:8000".to_string());

        Self {
            bind,
            storage_root,
            lease_seconds,
            reclaim_interval: Duration::from_millis(reclaim_interval_ms),
            base_url,
        }
    }
}
