//! HTTP surface (`spec.md` §6). Route handlers are thin: validate input,
//! call into `Engine`, map the result to the JSON shapes the table
//! prescribes.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Multipart, Path as AxPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use crowdcompute_common::{Capabilities, JobId, ParamMap, ParamValue, TaskId, UploadedFile, WorkerId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "CrowdCompute coordinator running..." }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub name: String,
    pub capabilities: Capabilities,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub worker_id: WorkerId,
    pub status: &'static str,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterBody>,
) -> Json<RegisterResponse> {
    let worker_id = state.engine.register_worker(body.name, body.capabilities);
    Json(RegisterResponse { worker_id, status: "registered" })
}

#[derive(Debug, Deserialize)]
pub struct WorkerIdQuery {
    pub worker_id: WorkerId,
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Query(q): Query<WorkerIdQuery>,
) -> Result<Response, ApiError> {
    match state.engine.get_task(&q.worker_id)? {
        // The wire contract (`spec.md` §6) only promises `task` and
        // `lease_expires`; `worker_id` is the caller's own, so it's dropped
        // here even though `LeaseView` carries it for the `/tasks` view.
        Some(view) => Ok(Json(json!({
            "task": view.task,
            "lease_expires": view.lease_expires,
        }))
        .into_response()),
        None => Ok(Json(json!({ "message": "No tasks available." })).into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReleaseTaskQuery {
    pub worker_id: WorkerId,
    pub task_id: TaskId,
}

pub async fn release_task(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ReleaseTaskQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.release_task(&q.worker_id, &q.task_id)?;
    Ok(Json(json!({ "message": format!("Task {} released successfully.", q.task_id) })))
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.engine.snapshot();
    Json(json!({
        "queued_tasks_count": snapshot.queued.len(),
        "assigned_tasks_count": snapshot.assigned.len(),
        "queued_tasks": snapshot.queued,
        "assigned_tasks": snapshot.assigned,
        "job_status": snapshot.jobs,
    }))
}

#[derive(Debug, Serialize)]
struct SubmitJobResponse {
    message: String,
    job_id: JobId,
    tasks_created: usize,
}

pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    AxPath(job_type): AxPath<String>,
    multipart: Multipart,
) -> Result<Json<SubmitJobResponse>, ApiError> {
    let (upload, params) = split_multipart(multipart)
        .await
        .map_err(|e| ApiError(crowdcompute_engine::EngineError::BadSubmission(e)))?;

    let (job_id, tasks_created) = state.engine.submit_job(&job_type, upload, params).await?;
    Ok(Json(SubmitJobResponse {
        message: format!("Job {job_id} accepted."),
        job_id,
        tasks_created,
    }))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: String,
    saved_path: String,
}

/// No leaseholder check: whoever knows a task's `(job_id, task_id)` upload
/// URL can post a result for it, lease or no lease. Preserved from the
/// source's upload contract rather than tightened (`spec.md` §9).
pub async fn upload_result(
    State(state): State<Arc<AppState>>,
    AxPath((job_id, task_id)): AxPath<(String, String)>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, StatusCode> {
    let (upload, _params) =
        split_multipart(multipart).await.map_err(|_| StatusCode::BAD_REQUEST)?;
    let Some(file) = upload else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let saved_path = state
        .store
        .write_result(&job_id, &task_id, &file.filename, &file.bytes)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let url = format!("{}/data/results/{}/{}", state.base_url, job_id, saved_path.file_name().unwrap().to_string_lossy());
    state.engine.record_result_url(&JobId::from(job_id), url);

    Ok(Json(UploadResponse {
        message: "Upload received.".to_string(),
        saved_path: saved_path.to_string_lossy().to_string(),
    }))
}

pub async fn get_job_file(
    State(state): State<Arc<AppState>>,
    AxPath((job_id, filename)): AxPath<(String, String)>,
) -> Result<Response, StatusCode> {
    let bytes = state.store.read_job_file(&job_id, &filename).await.ok_or(StatusCode::NOT_FOUND)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

pub async fn get_result_file(
    State(state): State<Arc<AppState>>,
    AxPath((job_id, filename)): AxPath<(String, String)>,
) -> Result<Response, StatusCode> {
    let bytes = state.store.read_result_file(&job_id, &filename).await.ok_or(StatusCode::NOT_FOUND)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

/// Splits a submission's multipart body into the (at most one) uploaded
/// file and the rest of the text fields, carried as string-valued params.
async fn split_multipart(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, ParamMap), String> {
    let mut upload = None;
    let mut params = ParamMap::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("").to_string();
            let bytes = field.bytes().await.map_err(|e| e.to_string())?.to_vec();
            upload = Some(UploadedFile { filename, bytes });
        } else if !name.is_empty() {
            let text = field.text().await.map_err(|e| e.to_string())?;
            params.insert(name, ParamValue::String(text));
        }
    }

    Ok((upload, params))
}
