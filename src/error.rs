//! Error taxonomy for the watch daemon.
//!
//! Fatal initialization errors (`SourceUnavailable`, `ModelLoad`, `Config`)
//! terminate the process with exit code 1. `UnknownClass` is recovered
//! locally with a placeholder label. `Runtime` covers any other failure
//! during the run loop and triggers a graceful shutdown with exit code 1.

use thiserror::Error;

/// Errors surfaced at the component seams.
///
/// `anyhow::Error` payloads are carried as plain fields; anyhow is used for
/// propagation inside components and flattened into these variants at the
/// public boundaries.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The camera device or stream URI could not be opened.
    #[error("source unavailable: {0}")]
    SourceUnavailable(anyhow::Error),

    /// The model or labels could not be loaded, or blob names were not
    /// found in the model graph.
    #[error("model load error: {0}")]
    ModelLoad(anyhow::Error),

    /// A class id fell outside the labels table.
    #[error("unknown class id {class_id} (labels table has {len} entries)")]
    UnknownClass { class_id: usize, len: usize },

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Any other failure during the run loop. Fail-fast: the run aborts
    /// rather than silently skipping frames.
    #[error("runtime failure: {0:#}")]
    Runtime(anyhow::Error),
}

impl WatchError {
    /// Process exit code for this error. Initialization and runtime
    /// failures all map to 1; interrupts and normal completion exit 0
    /// without constructing an error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl From<anyhow::Error> for WatchError {
    fn from(err: anyhow::Error) -> Self {
        WatchError::Runtime(err)
    }
}
