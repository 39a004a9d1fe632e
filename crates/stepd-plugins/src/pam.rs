// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PAM session plugin boundary (spec §2 Out of scope, §4.3 step 5,
//! §4.9 `Running -> Ending` "PAM finish").

use async_trait::async_trait;

use crate::error::PluginResult;

/// Opaque PAM session handle; consumed by `finish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PamSession(pub String);

#[async_trait]
pub trait PamPlugin: Send + Sync + 'static {
    /// Open a PAM session for `user` under `service`, while still root
    /// (spec §4.3 step 5 — keeps euid=root so PAM can run).
    async fn setup(&self, user: &str, service: &str) -> PluginResult<PamSession>;
    /// Close a session opened by `setup`. Failures here are logged and
    /// suppressed by the caller (spec §7 "Reclaim failures are logged and
    /// suppressed"), not propagated.
    async fn finish(&self, session: PamSession) -> PluginResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPamPlugin;

#[async_trait]
impl PamPlugin for NoopPamPlugin {
    async fn setup(&self, user: &str, _service: &str) -> PluginResult<PamSession> {
        Ok(PamSession(format!("noop-session-{user}")))
    }

    async fn finish(&self, _session: PamSession) -> PluginResult<()> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum PamCall {
        Setup { user: String, service: String },
        Finish { session: String },
    }

    struct FakeState {
        calls: Vec<PamCall>,
        setup_result: Option<PluginResult<PamSession>>,
    }

    #[derive(Clone)]
    pub struct FakePamPlugin {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakePamPlugin {
        fn default() -> Self {
            Self { inner: Arc::new(Mutex::new(FakeState { calls: Vec::new(), setup_result: None })) }
        }
    }

    impl FakePamPlugin {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<PamCall> {
            self.inner.lock().calls.clone()
        }

        pub fn fail_setup(&self, err: PluginError) {
            self.inner.lock().setup_result = Some(Err(err));
        }
    }

    #[async_trait]
    impl PamPlugin for FakePamPlugin {
        async fn setup(&self, user: &str, service: &str) -> PluginResult<PamSession> {
            let mut inner = self.inner.lock();
            inner.calls.push(PamCall::Setup { user: user.to_string(), service: service.to_string() });
            inner.setup_result.clone().unwrap_or_else(|| Ok(PamSession(format!("fake-session-{user}"))))
        }

        async fn finish(&self, session: PamSession) -> PluginResult<()> {
            self.inner.lock().calls.push(PamCall::Finish { session: session.0 });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePamPlugin, PamCall};
#[cfg(any(test, feature = "test-support"))]
use crate::error::PluginError;

#[cfg(test)]
#[path = "pam_tests.rs"]
mod tests;
