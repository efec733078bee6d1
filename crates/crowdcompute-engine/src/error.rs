use crowdcompute_common::PluginError;
use thiserror::Error;

/// Disposition matches `spec.md` §7: each variant is mapped to an HTTP status
/// by the coordinator's handlers, with no state mutated on failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("worker not found")]
    UnknownWorker,

    #[error("task not found or already released")]
    UnknownTask,

    #[error("worker not authorized to release this task")]
    NotLeaseholder,

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("plugin does not support submission: {0}")]
    PluginRefusedSubmission(String),

    #[error("bad submission: {0}")]
    BadSubmission(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PluginError> for EngineError {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::BadSubmission(m) => EngineError::BadSubmission(m),
            PluginError::UnsupportedSubmission(m) => EngineError::PluginRefusedSubmission(m),
            PluginError::Io(e) => EngineError::Internal(e.to_string()),
            PluginError::Other(m) => EngineError::Internal(m),
        }
    }
}
