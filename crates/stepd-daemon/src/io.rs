// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Standard I/O pump boundary (spec §2 Out of scope: "Standard I/O
//! threading (connect, pump, shutdown)"; spec §4.9 `Init -> Starting`
//! "I/O setup (`setup_io` or `setup_spawn_io`)", `Ending -> Complete`
//! "wait for I/O thread").
//!
//! The orchestrator needs exactly three things from whatever actually
//! pumps task stdout/stderr/stdin: start it (two shapes — regular launch
//! vs interactive spawn rendezvous), tell it to stop, and wait for it to
//! finish before tearing down the rest of the step. Everything about how
//! it connects sockets or threads frames is out of scope per spec §1/§2.

use std::os::unix::io::RawFd;

use async_trait::async_trait;
use stepd_core::StepContext;

use crate::error::OrchestratorError;

/// Lifecycle contract for the I/O subsystem (spec §4.9, §5 "I/O drain:
/// signal the I/O subsystem to shut down, then join the I/O thread if one
/// exists").
#[async_trait]
pub trait IoPump: Send + Sync + 'static {
    /// Connect and start pumping standard I/O for a regular `LaunchTasks`
    /// step.
    async fn setup(&self, ctx: &StepContext) -> Result<(), OrchestratorError>;
    /// Connect and start pumping standard I/O for an interactive `SpawnTask`
    /// rendezvous (spec §3 `is_spawn`).
    async fn setup_spawn(&self, ctx: &StepContext) -> Result<(), OrchestratorError>;
    /// Signal the pump to stop accepting new data and begin draining.
    async fn shutdown(&self);
    /// Block until the pump thread/task has fully stopped.
    async fn join(&self) -> Result<(), OrchestratorError>;

    /// The fd the manager's own logs could be redirected to once `setup`/
    /// `setup_spawn` has connected task 0's stderr (original
    /// `_slurmd_job_log_init`, which pointed the job manager's own stderr
    /// at the first task's). Whether and how to actually re-point logging
    /// at it is left to the binary wiring the pump together; a pump that
    /// has no such fd (or hasn't set one up yet) returns `None`.
    fn manager_log_fd(&self) -> Option<RawFd> {
        None
    }
}

/// No I/O pump at all — every call is a no-op success. Used for standalone
/// operation and for steps that redirect task I/O to files directly rather
/// than through a pumped connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIoPump;

#[async_trait]
impl IoPump for NoopIoPump {
    async fn setup(&self, _ctx: &StepContext) -> Result<(), OrchestratorError> {
        Ok(())
    }

    async fn setup_spawn(&self, _ctx: &StepContext) -> Result<(), OrchestratorError> {
        Ok(())
    }

    async fn shutdown(&self) {}

    async fn join(&self) -> Result<(), OrchestratorError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum IoCall {
        Setup,
        SetupSpawn,
        Shutdown,
        Join,
    }

    struct FakeState {
        calls: Vec<IoCall>,
        setup_failure: Option<String>,
        join_failure: Option<String>,
    }

    /// Records every call so orchestrator tests can assert ordering
    /// (setup before fork, shutdown+join after reaping).
    #[derive(Clone)]
    pub struct FakeIoPump {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeIoPump {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState {
                    calls: Vec::new(),
                    setup_failure: None,
                    join_failure: None,
                })),
            }
        }
    }

    impl FakeIoPump {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<IoCall> {
            self.inner.lock().calls.clone()
        }

        pub fn fail_setup(&self, reason: impl Into<String>) {
            self.inner.lock().setup_failure = Some(reason.into());
        }

        pub fn fail_join(&self, reason: impl Into<String>) {
            self.inner.lock().join_failure = Some(reason.into());
        }
    }

    #[async_trait]
    impl IoPump for FakeIoPump {
        async fn setup(&self, _ctx: &StepContext) -> Result<(), OrchestratorError> {
            let mut inner = self.inner.lock();
            inner.calls.push(IoCall::Setup);
            match inner.setup_failure.clone() {
                Some(reason) => Err(OrchestratorError::from(stepd_core::StepError::IoSetup(reason))),
                None => Ok(()),
            }
        }

        async fn setup_spawn(&self, _ctx: &StepContext) -> Result<(), OrchestratorError> {
            let mut inner = self.inner.lock();
            inner.calls.push(IoCall::SetupSpawn);
            match inner.setup_failure.clone() {
                Some(reason) => Err(OrchestratorError::from(stepd_core::StepError::IoSetup(reason))),
                None => Ok(()),
            }
        }

        async fn shutdown(&self) {
            self.inner.lock().calls.push(IoCall::Shutdown);
        }

        async fn join(&self) -> Result<(), OrchestratorError> {
            let mut inner = self.inner.lock();
            inner.calls.push(IoCall::Join);
            match inner.join_failure.clone() {
                Some(reason) => Err(OrchestratorError::from(stepd_core::StepError::IoSetup(reason))),
                None => Ok(()),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeIoPump, IoCall};

#[cfg(test)]
#[path = "io_tests.rs"]
mod tests;
