// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accounting (jobacct) plugin boundary (spec §2 Out of scope, §4.4
//! Reaper "fold rusage in, aggregate into step accounting", GLOSSARY
//! "Jobacct: supports allocate/aggregate/getinfo/free as opaque
//! operations").

use async_trait::async_trait;
use stepd_core::JobAcct;

use crate::error::PluginResult;

#[async_trait]
pub trait AccountingPlugin: Send + Sync + 'static {
    /// Begin tracking a freshly-forked task's resource usage.
    async fn register_pid(&self, pid: i32) -> PluginResult<()>;
    /// Poll the current aggregate for a tracked pid (spec §4.4 "Pull
    /// per-pid accounting data, fold rusage in").
    async fn poll(&self, pid: i32) -> PluginResult<JobAcct>;
    /// Release the per-pid record once the task has been reaped (spec
    /// §4.4 "release the per-pid record").
    async fn release(&self, pid: i32) -> PluginResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAccountingPlugin;

#[async_trait]
impl AccountingPlugin for NoopAccountingPlugin {
    async fn register_pid(&self, _pid: i32) -> PluginResult<()> {
        Ok(())
    }

    async fn poll(&self, _pid: i32) -> PluginResult<JobAcct> {
        Ok(JobAcct::default())
    }

    async fn release(&self, _pid: i32) -> PluginResult<()> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeState {
        registered: Vec<i32>,
        released: Vec<i32>,
        usage: HashMap<i32, JobAcct>,
    }

    /// In-memory accounting double: callers pre-seed `usage` with the
    /// aggregate a `poll` for that pid should return.
    #[derive(Clone, Default)]
    pub struct FakeAccountingPlugin {
        inner: Arc<Mutex<FakeState>>,
    }

    impl FakeAccountingPlugin {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_usage(&self, pid: i32, usage: JobAcct) {
            self.inner.lock().usage.insert(pid, usage);
        }

        pub fn registered(&self) -> Vec<i32> {
            self.inner.lock().registered.clone()
        }

        pub fn released(&self) -> Vec<i32> {
            self.inner.lock().released.clone()
        }
    }

    #[async_trait]
    impl AccountingPlugin for FakeAccountingPlugin {
        async fn register_pid(&self, pid: i32) -> PluginResult<()> {
            self.inner.lock().registered.push(pid);
            Ok(())
        }

        async fn poll(&self, pid: i32) -> PluginResult<JobAcct> {
            Ok(self.inner.lock().usage.get(&pid).copied().unwrap_or_default())
        }

        async fn release(&self, pid: i32) -> PluginResult<()> {
            self.inner.lock().released.push(pid);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAccountingPlugin;

#[cfg(test)]
#[path = "accounting_tests.rs"]
mod tests;
