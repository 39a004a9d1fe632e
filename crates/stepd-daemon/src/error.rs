// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level orchestration error, composed via `#[from]` from every
//! stage's own error type (spec §7 "Error taxonomy as a tagged variant").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Step(#[from] stepd_core::StepError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("plugin hook failed: {0}")]
    Plugin(#[from] stepd_plugins::PluginError),
    #[error(transparent)]
    Transport(#[from] stepd_wire::TransportError),
}

impl OrchestratorError {
    /// Return code to substitute when this error aborted the step before
    /// any task-level return code was established (spec §7).
    pub fn as_return_code(&self) -> i32 {
        match self {
            OrchestratorError::Step(e) => e.as_return_code(),
            _ => -1,
        }
    }
}
