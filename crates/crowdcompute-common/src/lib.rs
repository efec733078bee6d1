//! Shared wire types, identifiers, and the plugin contract used by the
//! coordinator, the worker, and every job-type plugin.

pub mod ids;
pub mod model;
pub mod params;
pub mod plugin;

pub use ids::{JobId, TaskId, WorkerId};
pub use model::{Capabilities, JobState, LeaseView, Task, TaskPayload, WorkerInfo};
pub use params::{param_string, param_usize, ParamMap, ParamValue};
pub use plugin::{CompletionContext, ExecuteOutcome, Plugin, PluginError, TaskingContext, UploadedFile};
