use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use crowdcompute_engine::EngineError;
use serde_json::json;

/// Wraps `EngineError` so it can be returned directly from axum handlers.
/// Status codes follow `spec.md` §6/§7's disposition table.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::UnknownWorker => StatusCode::NOT_FOUND,
            EngineError::UnknownTask => StatusCode::NOT_FOUND,
            EngineError::NotLeaseholder => StatusCode::FORBIDDEN,
            EngineError::UnknownJobType(_) => StatusCode::NOT_FOUND,
            EngineError::PluginRefusedSubmission(_) => StatusCode::BAD_REQUEST,
            EngineError::BadSubmission(_) => StatusCode::BAD_REQUEST,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}
