// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container/proctrack plugin boundary (spec §2 Out of scope, §4.3, §4.9
//! "Straggler kill", GLOSSARY "Container").

use async_trait::async_trait;

use crate::error::{PluginError, PluginResult};

/// Opaque process-tracking group handle, stored as `StepContext::container_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle(pub String);

/// Scoped container/proctrack operations: create a group at step start,
/// add forked pids to it, mass-signal and destroy it at teardown.
#[async_trait]
pub trait ContainerPlugin: Send + Sync + 'static {
    async fn create(&self, job_id: u32, step_id: u32) -> PluginResult<ContainerHandle>;
    async fn add(&self, container: &ContainerHandle, pid: i32) -> PluginResult<()>;
    async fn signal(&self, container: &ContainerHandle, signal: i32) -> PluginResult<()>;
    /// Returns `Ok(())` once every process in the group is gone; callers
    /// retry on failure with backoff (spec §4.9 straggler kill).
    async fn destroy(&self, container: &ContainerHandle) -> PluginResult<()>;
}

/// Always-succeeds implementation for steps that don't need process
/// isolation beyond the OS process group (e.g. standalone testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopContainerPlugin;

#[async_trait]
impl ContainerPlugin for NoopContainerPlugin {
    async fn create(&self, job_id: u32, step_id: u32) -> PluginResult<ContainerHandle> {
        Ok(ContainerHandle(format!("noop-{job_id}.{step_id}")))
    }

    async fn add(&self, _container: &ContainerHandle, _pid: i32) -> PluginResult<()> {
        Ok(())
    }

    async fn signal(&self, _container: &ContainerHandle, _signal: i32) -> PluginResult<()> {
        Ok(())
    }

    async fn destroy(&self, _container: &ContainerHandle) -> PluginResult<()> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum ContainerCall {
        Create { job_id: u32, step_id: u32 },
        Add { pid: i32 },
        Signal { signal: i32 },
        Destroy,
    }

    struct FakeState {
        calls: Vec<ContainerCall>,
        create_result: Option<PluginResult<ContainerHandle>>,
        /// `destroy` failures to return before finally succeeding, modeling
        /// the straggler-kill retry loop (spec §4.9).
        destroy_failures: VecDeque<PluginError>,
    }

    #[derive(Clone)]
    pub struct FakeContainerPlugin {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeContainerPlugin {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState {
                    calls: Vec::new(),
                    create_result: None,
                    destroy_failures: VecDeque::new(),
                })),
            }
        }
    }

    impl FakeContainerPlugin {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<ContainerCall> {
            self.inner.lock().calls.clone()
        }

        pub fn fail_create(&self, err: PluginError) {
            self.inner.lock().create_result = Some(Err(err));
        }

        pub fn queue_destroy_failure(&self, err: PluginError) {
            self.inner.lock().destroy_failures.push_back(err);
        }
    }

    #[async_trait]
    impl ContainerPlugin for FakeContainerPlugin {
        async fn create(&self, job_id: u32, step_id: u32) -> PluginResult<ContainerHandle> {
            let mut inner = self.inner.lock();
            inner.calls.push(ContainerCall::Create { job_id, step_id });
            inner
                .create_result
                .clone()
                .unwrap_or_else(|| Ok(ContainerHandle(format!("fake-{job_id}.{step_id}"))))
        }

        async fn add(&self, _container: &ContainerHandle, pid: i32) -> PluginResult<()> {
            self.inner.lock().calls.push(ContainerCall::Add { pid });
            Ok(())
        }

        async fn signal(&self, _container: &ContainerHandle, signal: i32) -> PluginResult<()> {
            self.inner.lock().calls.push(ContainerCall::Signal { signal });
            Ok(())
        }

        async fn destroy(&self, _container: &ContainerHandle) -> PluginResult<()> {
            let mut inner = self.inner.lock();
            inner.calls.push(ContainerCall::Destroy);
            match inner.destroy_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{ContainerCall, FakeContainerPlugin};

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
