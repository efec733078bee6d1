//! Artifact store (`spec.md` §4.3): two URL spaces rooted at a configurable
//! `storage_root`, `jobs/` for plugin-produced shards and `results/` for
//! task uploads. A thin `tokio::fs` wrapper — no eviction, no locking beyond
//! the exclusive-write-by-naming-convention guarantee the spec already
//! grants by construction.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join("jobs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.jobs_dir()).await?;
        tokio::fs::create_dir_all(self.results_dir()).await
    }

    pub async fn read_job_file(&self, job_id: &str, filename: &str) -> Option<Vec<u8>> {
        read_namespaced(&self.jobs_dir(), job_id, filename).await
    }

    pub async fn read_result_file(&self, job_id: &str, filename: &str) -> Option<Vec<u8>> {
        read_namespaced(&self.results_dir(), job_id, filename).await
    }

    /// Persists an uploaded result. The stored filename is
    /// `{task_id}_{original_filename}` — a later upload for the same
    /// `(job_id, task_id, filename)` silently overwrites the earlier one.
    pub async fn write_result(
        &self,
        job_id: &str,
        task_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        let dir = self.results_dir().join(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        let stored_name = format!("{task_id}_{filename}");
        let path = dir.join(stored_name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

async fn read_namespaced(base: &Path, job_id: &str, filename: &str) -> Option<Vec<u8>> {
    if job_id.contains("..") || filename.contains("..") {
        return None;
    }
    let path = base.join(job_id).join(filename);
    tokio::fs::read(&path).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_result_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        store.ensure_dirs().await.unwrap();

        let path = store.write_result("job-1", "task-1", "out.txt", b"hello").await.unwrap();
        assert!(path.ends_with("task-1_out.txt"));

        let read = store.read_result_file("job-1", "task-1_out.txt").await.unwrap();
        assert_eq!(read, b"hello");
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        store.ensure_dirs().await.unwrap();
        assert!(store.read_job_file("../escape", "x").await.is_none());
        assert!(store.read_job_file("job", "../../etc/passwd").await.is_none());
    }
}
