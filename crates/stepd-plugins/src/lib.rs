// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trait boundaries for the plugin stack the step manager drives but does
//! not implement: container/proctrack, switch/interconnect, PAM,
//! accounting, and the spank hook interface (spec §2 Out of scope).
//!
//! Each module offers a `Noop*` implementation for standalone operation
//! and a `Fake*` double behind `test-support` for orchestrator tests.

mod accounting;
mod container;
mod error;
mod pam;
mod spank;
mod switch;

pub use accounting::{AccountingPlugin, NoopAccountingPlugin};
pub use container::{ContainerHandle, ContainerPlugin, NoopContainerPlugin};
pub use error::{PluginError, PluginResult};
pub use pam::{NoopPamPlugin, PamPlugin, PamSession};
pub use spank::{NoopSpankPlugin, SpankPlugin};
pub use switch::{NoopSwitchPlugin, SwitchContext, SwitchPlugin};

#[cfg(any(test, feature = "test-support"))]
pub use accounting::FakeAccountingPlugin;
#[cfg(any(test, feature = "test-support"))]
pub use container::{ContainerCall, FakeContainerPlugin};
#[cfg(any(test, feature = "test-support"))]
pub use pam::{FakePamPlugin, PamCall};
#[cfg(any(test, feature = "test-support"))]
pub use spank::{FakeSpankPlugin, SpankCall};
#[cfg(any(test, feature = "test-support"))]
pub use switch::{FakeSwitchPlugin, SwitchCall};
