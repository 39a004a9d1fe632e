// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Switch/interconnect plugin boundary (spec §2 Out of scope, §4.9 state
//! table: "interconnect pre-init", "interconnect init as target uid",
//! "interconnect fini", "interconnect postfini").

use async_trait::async_trait;

use crate::error::PluginResult;

/// Minimal context an interconnect plugin needs: which step, how many
/// tasks, which nodes.
#[derive(Debug, Clone, Copy)]
pub struct SwitchContext {
    pub job_id: u32,
    pub step_id: u32,
    pub ntasks: usize,
    pub nnodes: usize,
}

#[async_trait]
pub trait SwitchPlugin: Send + Sync + 'static {
    /// Run before tasks are forked, as root (spec §4.9 `Init -> Starting`).
    async fn pre_init(&self, ctx: &SwitchContext) -> PluginResult<()>;
    /// Run after privileges drop to the target uid (spec §4.9 `Init -> Starting`).
    async fn init(&self, ctx: &SwitchContext) -> PluginResult<()>;
    /// Run once all tasks have exited (spec §4.9 `Running -> Ending`).
    async fn fini(&self, ctx: &SwitchContext) -> PluginResult<()>;
    /// Run after accounting/PAM teardown, before straggler kill (spec §4.9
    /// `Ending -> Complete`).
    async fn post_fini(&self, ctx: &SwitchContext) -> PluginResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSwitchPlugin;

#[async_trait]
impl SwitchPlugin for NoopSwitchPlugin {
    async fn pre_init(&self, _ctx: &SwitchContext) -> PluginResult<()> {
        Ok(())
    }

    async fn init(&self, _ctx: &SwitchContext) -> PluginResult<()> {
        Ok(())
    }

    async fn fini(&self, _ctx: &SwitchContext) -> PluginResult<()> {
        Ok(())
    }

    async fn post_fini(&self, _ctx: &SwitchContext) -> PluginResult<()> {
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
    pub enum SwitchCall {
        PreInit,
        Init,
        Fini,
        PostFini,
    }

    #[derive(Clone, Default)]
    pub struct FakeSwitchPlugin {
        calls: Arc<Mutex<Vec<SwitchCall>>>,
    }

    impl FakeSwitchPlugin {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<SwitchCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl SwitchPlugin for FakeSwitchPlugin {
        async fn pre_init(&self, _ctx: &SwitchContext) -> PluginResult<()> {
            self.calls.lock().push(SwitchCall::PreInit);
            Ok(())
        }

        async fn init(&self, _ctx: &SwitchContext) -> PluginResult<()> {
            self.calls.lock().push(SwitchCall::Init);
            Ok(())
        }

        async fn fini(&self, _ctx: &SwitchContext) -> PluginResult<()> {
            self.calls.lock().push(SwitchCall::Fini);
            Ok(())
        }

        async fn post_fini(&self, _ctx: &SwitchContext) -> PluginResult<()> {
            self.calls.lock().push(SwitchCall::PostFini);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSwitchPlugin, SwitchCall};

#[cfg(test)]
#[path = "switch_tests.rs"]
mod tests;
