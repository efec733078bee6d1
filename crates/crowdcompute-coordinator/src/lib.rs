pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod storage;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/register", post(handlers::register))
        .route("/get-task", post(handlers::get_task))
        .route("/release-task", post(handlers::release_task))
        .route("/tasks", get(handlers::list_tasks))
        .route("/submit-job/{job_type}", post(handlers::submit_job))
        .route("/upload/{job_id}/{task_id}", post(handlers::upload_result))
        .route("/data/jobs/{job_id}/{file}", get(handlers::get_job_file))
        .route("/data/results/{job_id}/{file}", get(handlers::get_result_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
