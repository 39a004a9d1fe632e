// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin-stack (spank) hook boundary (spec §2 Out of scope, §4.3 steps
//! 2/8/11/12, §4.4 "Invoke `spank_task_exit`", GLOSSARY "Spank: ... a
//! non-zero return ⇒ abort this step").

use async_trait::async_trait;

use crate::error::PluginResult;

#[async_trait]
pub trait SpankPlugin: Send + Sync + 'static {
    /// Plugin-stack init, before any task is forked (spec §4.3 step 2).
    async fn init(&self, job_id: u32, step_id: u32) -> PluginResult<()>;
    /// `spank_user`, run once privileges are at the target uid and cwd is
    /// resolved (spec §4.3 step 8).
    async fn user_init(&self, job_id: u32, step_id: u32) -> PluginResult<()>;
    /// Run in the parent after a task's pid is registered with the
    /// container and accounting (spec §4.3 step 11).
    async fn task_post_fork(&self, local_task: usize, pid: i32) -> PluginResult<()>;
    /// Run after a task is reaped, before the task's own exit hook (spec §4.4).
    async fn task_exit(&self, local_task: usize) -> PluginResult<()>;
    /// Plugin-stack teardown (spec §4.9 `Ending -> Complete`).
    async fn fini(&self, job_id: u32, step_id: u32) -> PluginResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpankPlugin;

#[async_trait]
impl SpankPlugin for NoopSpankPlugin {
    async fn init(&self, _job_id: u32, _step_id: u32) -> PluginResult<()> {
        Ok(())
    }

    async fn user_init(&self, _job_id: u32, _step_id: u32) -> PluginResult<()> {
        Ok(())
    }

    async fn task_post_fork(&self, _local_task: usize, _pid: i32) -> PluginResult<()> {
        Ok(())
    }

    async fn task_exit(&self, _local_task: usize) -> PluginResult<()> {
        Ok(())
    }

    async fn fini(&self, _job_id: u32, _step_id: u32) -> PluginResult<()> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SpankCall {
        Init,
        UserInit,
        TaskPostFork { local_task: usize, pid: i32 },
        TaskExit { local_task: usize },
        Fini,
    }

    struct FakeState {
        calls: Vec<SpankCall>,
        failing_post_fork_tasks: HashSet<usize>,
    }

    #[derive(Clone)]
    pub struct FakeSpankPlugin {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeSpankPlugin {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState {
                    calls: Vec::new(),
                    failing_post_fork_tasks: HashSet::new(),
                })),
            }
        }
    }

    impl FakeSpankPlugin {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<SpankCall> {
            self.inner.lock().calls.clone()
        }

        /// Make `task_post_fork` fail for a specific local task, modeling
        /// spec §9's "if a post-fork hook hangs/fails, tasks never exec".
        pub fn fail_post_fork_for(&self, local_task: usize) {
            self.inner.lock().failing_post_fork_tasks.insert(local_task);
        }
    }

    #[async_trait]
    impl SpankPlugin for FakeSpankPlugin {
        async fn init(&self, _job_id: u32, _step_id: u32) -> PluginResult<()> {
            self.inner.lock().calls.push(SpankCall::Init);
            Ok(())
        }

        async fn user_init(&self, _job_id: u32, _step_id: u32) -> PluginResult<()> {
            self.inner.lock().calls.push(SpankCall::UserInit);
            Ok(())
        }

        async fn task_post_fork(&self, local_task: usize, pid: i32) -> PluginResult<()> {
            let mut inner = self.inner.lock();
            inner.calls.push(SpankCall::TaskPostFork { local_task, pid });
            if inner.failing_post_fork_tasks.contains(&local_task) {
                return Err(PluginError::new(format!("post-fork hook failed for task {local_task}")));
            }
            Ok(())
        }

        async fn task_exit(&self, local_task: usize) -> PluginResult<()> {
            self.inner.lock().calls.push(SpankCall::TaskExit { local_task });
            Ok(())
        }

        async fn fini(&self, _job_id: u32, _step_id: u32) -> PluginResult<()> {
            self.inner.lock().calls.push(SpankCall::Fini);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSpankPlugin, SpankCall};
#[cfg(any(test, feature = "test-support"))]
use crate::error::PluginError;

#[cfg(test)]
#[path = "spank_tests.rs"]
mod tests;
