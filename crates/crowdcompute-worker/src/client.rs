//! Thin `reqwest` wrapper for the five coordinator calls the worker loop
//! makes. Mirrors `spec.md` §6's wire shapes exactly.

use crowdcompute_common::{Capabilities, Task, TaskId, WorkerId};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("coordinator returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    worker_id: WorkerId,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GetTaskResponse {
    Assigned { task: Task },
    Empty { message: String },
}

pub struct CoordinatorClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: String) -> Self {
        Self { http: reqwest::Client::new(), base_url }
    }

    pub async fn register(&self, name: &str, capabilities: Capabilities) -> Result<WorkerId, ClientError> {
        let resp = self
            .http
            .post(format!("{}/register", self.base_url))
            .json(&serde_json::json!({ "name": name, "capabilities": capabilities }))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json::<RegisterResponse>().await?.worker_id)
    }

    pub async fn get_task(&self, worker_id: &WorkerId) -> Result<Option<Task>, ClientError> {
        let resp = self
            .http
            .post(format!("{}/get-task", self.base_url))
            .query(&[("worker_id", worker_id.as_str())])
            .send()
            .await?;
        let resp = check_status(resp).await?;
        match resp.json::<GetTaskResponse>().await? {
            GetTaskResponse::Assigned { task } => Ok(Some(task)),
            GetTaskResponse::Empty { .. } => Ok(None),
        }
    }

    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), ClientError> {
        let resp = self.http.get(url).send().await?;
        let resp = check_status(resp).await?;
        let bytes = resp.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    pub async fn upload_result(&self, output_path: &str, local_file: &Path) -> Result<(), ClientError> {
        let bytes = tokio::fs::read(local_file).await?;
        let filename = local_file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename);
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self.http.post(output_path).multipart(form).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    pub async fn release_task(&self, worker_id: &WorkerId, task_id: &TaskId) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(format!("{}/release-task", self.base_url))
            .query(&[("worker_id", worker_id.as_str()), ("task_id", task_id.as_str())])
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::Status { status, body })
    }
}
