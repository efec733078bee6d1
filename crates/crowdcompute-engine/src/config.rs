use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the scheduling engine. Defaults match `spec.md` §6.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Externally reachable URL workers use to build download/upload links.
    pub base_url: String,
    /// Root directory backing the artifact store (`{storage_root}/jobs`,
    /// `{storage_root}/results`).
    pub storage_root: PathBuf,
    /// How long a lease holds before `reclaim_expired` returns the task to
    /// the queue.
    pub lease_duration: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            storage_root: PathBuf::from("file_storage"),
            lease_duration: Duration::from_secs(15),
        }
    }
}

impl EngineConfig {
    pub fn jobs_dir(&self) -> PathBuf {
        self.storage_root.join("jobs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.storage_root.join("results")
    }
}
