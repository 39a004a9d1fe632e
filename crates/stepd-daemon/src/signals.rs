// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The manager's blocked signal set (spec §6 Signals).

use nix::sys::signal::{self, SigSet, SigmaskHow, Signal};
use stepd_core::{StepError, StepResult};

/// `{SIGINT, SIGTERM, SIGTSTP, SIGQUIT, SIGPIPE, SIGUSR1, SIGUSR2,
/// SIGALRM, SIGHUP}` (spec §6).
pub fn manager_sigset() -> SigSet {
    let mut set = SigSet::empty();
    for sig in [
        Signal::SIGINT,
        Signal::SIGTERM,
        Signal::SIGTSTP,
        Signal::SIGQUIT,
        Signal::SIGPIPE,
        Signal::SIGUSR1,
        Signal::SIGUSR2,
        Signal::SIGALRM,
        Signal::SIGHUP,
    ] {
        set.add(sig);
    }
    set
}

/// Block the manager signal set on the calling thread. Children inherit
/// this mask across `fork` and unblock it themselves before `exec`
/// (spec §4.3 step 9b, §6).
pub fn block_manager_signals() -> StepResult<()> {
    signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&manager_sigset()), None)
        .map_err(|e| StepError::IoSetup(format!("failed to block manager signal set: {e}")))
}

/// Unblock the manager signal set. Called in the forked child before
/// `exec_task` so the user program starts with a sane signal mask.
pub fn unblock_manager_signals() {
    let _ = signal::pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&manager_sigset()), None);
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
