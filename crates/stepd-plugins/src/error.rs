// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single failure type shared by every plugin boundary in this crate.
//! `stepd-daemon` maps a `PluginError` into the matching `stepd_core::StepError`
//! variant for the stage that called it (spec §7).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PluginError(pub String);

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type PluginResult<T> = Result<T, PluginError>;
