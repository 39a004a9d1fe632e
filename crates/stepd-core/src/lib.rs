//! Shared domain types for the per-node step manager: step identity,
//! task bookkeeping, privilege snapshots and the reverse-tree completion
//! state machine. No I/O, no process control — those live in
//! `stepd-daemon`; no wire formats — those live in `stepd-wire`.

#[macro_use]
mod macros;

pub mod completion;
pub mod context;
pub mod error;
pub mod ids;
pub mod privilege;
pub mod task;

pub use completion::{CompletionRange, CompletionState, WaitOutcome, NO_RC};
pub use context::{ClientLink, Environment, JobAcct, OrchestratorState, StepContext, UserIdentity};
pub use error::{StepError, StepResult};
pub use ids::{GlobalTaskId, JobId, NodeId, StepId, NO_STEP};
pub use privilege::PrivilegeSnapshot;
pub use task::{wexitstatus, wifsignaled, TaskRecord, TaskState};
