// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipe Pair Array (C2): one exec-gate pipe per local task (spec §4.2).

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::unistd::pipe;
use stepd_core::{StepError, StepResult};

/// One task's exec-gate pipe. The child reads one byte from `read_end`
/// before invoking the program image; the parent writes that byte once the
/// task has been fully registered (process group, container, accounting,
/// spank post-fork) — see spec §4.3 steps 9b and 12.
pub struct GatePipe {
    pub read_end: OwnedFd,
    pub write_end: OwnedFd,
}

/// Allocate one gate pipe per local task, with both ends close-on-exec
/// (spec §4.2: "set close-on-exec on both ends").
pub fn allocate(ntasks: usize) -> StepResult<Vec<GatePipe>> {
    let mut pipes = Vec::with_capacity(ntasks);
    for _ in 0..ntasks {
        let (read_end, write_end) = pipe().map_err(|e| StepError::Pipe(format!("pipe: {e}")))?;
        set_cloexec(&read_end).map_err(|e| StepError::Pipe(format!("fcntl read end: {e}")))?;
        set_cloexec(&write_end).map_err(|e| StepError::Pipe(format!("fcntl write end: {e}")))?;
        pipes.push(GatePipe { read_end, write_end });
    }
    Ok(pipes)
}

fn set_cloexec(fd: &OwnedFd) -> nix::Result<()> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map(|_| ())
}

/// In the forked child for local task `my_index`: close every write end
/// (the gate belongs to the parent) and every read end for `j > my_index`
/// (spec §4.3 step 9b). Read ends for `j <= my_index` are already closed by
/// the parent (step 9c) by the time this task's fork happens, so the child
/// inherits them already-closed and has nothing left to do for those.
pub fn close_unowned_ends(pipes: &[GatePipe], my_index: usize) {
    for (i, p) in pipes.iter().enumerate() {
        close_raw(p.write_end.as_raw_fd());
        if i > my_index {
            close_raw(p.read_end.as_raw_fd());
        }
    }
}

fn close_raw(fd: RawFd) {
    // Best effort: a double-close or a fd that cloexec already reaped
    // across the fork is not a failure the child can act on.
    let _ = nix::unistd::close(fd);
}

#[cfg(test)]
#[path = "pipes_tests.rs"]
mod tests;
