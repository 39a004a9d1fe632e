//! `StepContext` — the per-step working set (spec §3).

use crate::ids::{JobId, NodeId, StepId};
use crate::task::TaskRecord;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Orchestrator state machine position (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Init,
    Starting,
    Running,
    Ending,
    Complete,
}

crate::simple_display! {
    OrchestratorState {
        Init => "init",
        Starting => "starting",
        Running => "running",
        Ending => "ending",
        Complete => "complete",
    }
}

/// Resolved password-database record for the job's user.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub uid: u32,
    pub gid: u32,
    pub name: String,
    pub home: PathBuf,
    /// Pre-resolved supplementary gids, if the controller sent them; `None`
    /// means "derive via the platform group database" (spec §4.1).
    pub supplementary_gids: Option<Vec<u32>>,
}

/// Ordered key/value environment block. Order matters: it is replayed
/// verbatim into the child's `execve` environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    entries: Vec<(String, String)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if let Some(existing) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value.into();
        } else {
            self.entries.push((key, value.into()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Remove a variable, returning its prior value if present. Used to
    /// strip `SLURM_PRIO_PROCESS` before exec (spec §6 Environment).
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as `KEY=value` pairs in insertion order, suitable for
    /// `std::process::Command::envs` or a raw `execve` envp array.
    pub fn to_assignment_strings(&self) -> Vec<String> {
        self.entries.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

/// Network address of an originating client (`srun`) plus the response
/// endpoint messages are delivered to. Used only for sending, never
/// receiving (spec §3 `ClientLink`).
#[derive(Debug, Clone)]
pub struct ClientLink {
    pub client_addr: SocketAddr,
    /// Response endpoint for task-exit / launch-reply messages. `None`
    /// models an endpoint with a zero address family (spec §4.5, §6):
    /// such links are skipped when broadcasting task-exit messages.
    pub resp_addr: Option<SocketAddr>,
}

impl ClientLink {
    pub fn has_response_endpoint(&self) -> bool {
        self.resp_addr.is_some()
    }
}

/// Cumulative accounting aggregate. Fields are the minimal set the
/// completion tree and reaper need to fold and forward (spec §3 `jobacct`,
/// §4.4, §4.6); real statistic collection happens in the accounting
/// plugin (`stepd_plugins::accounting`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobAcct {
    pub user_cpu_usec: u64,
    pub sys_cpu_usec: u64,
    pub max_rss_kb: u64,
    pub max_vsize_kb: u64,
}

impl JobAcct {
    /// Fold another aggregate into this one: cumulative counters sum,
    /// high-water-mark counters take the max.
    pub fn aggregate(&mut self, other: &JobAcct) {
        self.user_cpu_usec += other.user_cpu_usec;
        self.sys_cpu_usec += other.sys_cpu_usec;
        self.max_rss_kb = self.max_rss_kb.max(other.max_rss_kb);
        self.max_vsize_kb = self.max_vsize_kb.max(other.max_vsize_kb);
    }
}

/// The per-step working set (spec §3 `StepContext`).
pub struct StepContext {
    pub job_id: JobId,
    pub step_id: StepId,
    pub node_id: NodeId,

    pub ntasks: usize,
    pub nnodes: usize,

    pub is_batch: bool,
    pub is_spawn: bool,
    pub debug_level: u32,

    pub user: UserIdentity,

    /// Opaque container/proctrack handle once `ContainerPlugin::create`
    /// succeeds.
    pub container_id: Option<String>,

    pub tasks: Vec<TaskRecord>,
    pub env: Environment,
    pub clients: Vec<ClientLink>,

    /// Program image and arguments every local task execs (spec §6
    /// `LaunchTasks{..., argv}`). Identical across tasks in this node's
    /// step — MPMD task-specific argv is out of scope.
    pub argv: Vec<String>,

    /// Process group id of task 0, set once the first task is forked.
    pub pgid: Option<i32>,

    /// cwd requested for the job; on chdir failure the orchestrator falls
    /// back to `/tmp` (spec §4.3 step 7, Design Notes §9).
    pub cwd: PathBuf,

    /// Spool-relative directory for a batch step, owned by this context and
    /// removed on batch completion (invariant 6).
    pub batch_dir: Option<PathBuf>,

    pub state: OrchestratorState,

    /// Running per-step accounting aggregate (local tasks only; the
    /// completion tree separately folds child subtrees).
    pub jobacct: JobAcct,
}

impl StepContext {
    /// `"{spool}/job{job:05}"` or `"{spool}/job{job:05}.{step:05}"`
    /// (spec §4.7, §6 filesystem surface).
    pub fn batch_dir_name(&self) -> String {
        if self.step_id.is_none() {
            format!("job{:05}", self.job_id.get())
        } else {
            format!("job{:05}.{:05}", self.job_id.get(), self.step_id.get())
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
