//! Error taxonomy shared by every stage of the step manager (spec §7).
//!
//! Each variant names an abstract failure kind, not a wrapped system error
//! code — `#[from]`/`#[source]` carry the underlying `io::Error` or `nix`
//! errno where one exists.

use thiserror::Error;

/// All failure kinds a step manager component can report.
#[derive(Debug, Error)]
pub enum StepError {
    // -- step infrastructure --
    #[error("I/O setup failed: {0}")]
    IoSetup(String),
    #[error("interconnect pre-init failed: {0}")]
    InterconnectPreInit(String),
    #[error("interconnect init failed: {0}")]
    InterconnectInit(String),
    #[error("interconnect post-fini failed: {0}")]
    InterconnectPostFini(String),

    // -- plugin / isolation --
    #[error("container create failed: {0}")]
    ContainerCreate(String),
    #[error("container add failed for pid {pid}: {source}")]
    ContainerAdd { pid: i32, source: Box<StepError> },
    #[error("plugin stack init failed: {0}")]
    PluginInit(String),
    #[error("plugin user hook failed: {0}")]
    PluginUserHook(String),
    #[error("plugin post-fork hook failed for task {task}: {reason}")]
    PluginPostFork { task: usize, reason: String },
    #[error("plugin task-exit hook failed for task {task}: {reason}")]
    PluginTaskExit { task: usize, reason: String },
    #[error("PAM session setup failed: {0}")]
    PamSetup(String),

    // -- identity transitions --
    #[error("failed to drop privileges: {0}")]
    PrivilegeDrop(String),
    #[error("failed to reclaim privileges: {0}")]
    PrivilegeReclaim(String),
    #[error("failed to permanently become job user: {0}")]
    BecomeUser(String),

    // -- process creation --
    #[error("fork failed: {0}")]
    Fork(String),
    #[error("task {task} exec failed with status {status}")]
    Exec { task: usize, status: i32 },
    #[error("chdir failed for both job cwd and /tmp: {0}")]
    Chdir(String),
    #[error("pipe allocation failed: {0}")]
    Pipe(String),

    // -- messaging --
    #[error("transport timed out after {attempts} attempt(s)")]
    TransportTimeout { attempts: u32 },
    #[error("transport exhausted all {max_retry} retries")]
    TransportExhausted { max_retry: u32 },
    #[error("completion tree degraded: {missing} rank(s) orphaned by timeout")]
    TreeDegraded { missing: usize },

    // -- batch staging --
    #[error("failed to create batch directory {path}: {source}")]
    BatchDirCreate { path: String, source: std::io::Error },
    #[error("failed to materialize batch script {path}: {source}")]
    BatchScriptCreate { path: String, source: std::io::Error },
    #[error("failed to chown/chmod batch script {path}: {source}")]
    BatchScriptChownChmod { path: String, source: std::io::Error },
}

impl StepError {
    /// A non-zero return code suitable for a `LaunchTasksResponse` or
    /// `RequestCompleteBatchScript` when this error aborted the step before
    /// any task-level return code was established (spec §7: "substitute a
    /// non-zero transport return code").
    pub fn as_return_code(&self) -> i32 {
        -1
    }
}

pub type StepResult<T> = Result<T, StepError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
