// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reaper (C4): non-blocking and blocking reaping, exit-status aggregation,
//! task-epilog execution, accounting aggregation (spec §4.4).

use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use stepd_core::StepContext;
use stepd_plugins::{AccountingPlugin, SpankPlugin};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::batcher;
use stepd_wire::Transport;

/// `reap(ctx, waitflag)` from spec §4.4.
///
/// `waitflag == true`: one blocking wait for any child.
/// `waitflag == false`: repeated non-blocking waits until none are ready.
///
/// Returns the number of tasks matched this call, or `None` if the first
/// `waitpid` returned `ECHILD` immediately (spec's `-1` sentinel).
pub async fn reap(
    ctx: &mut StepContext,
    waitflag: bool,
    accounting: &dyn AccountingPlugin,
    spank: &dyn SpankPlugin,
    task_epilog: Option<&Path>,
    task_epilog_site: Option<&Path>,
) -> Option<usize> {
    let mut matched = 0usize;
    let mut first = true;

    loop {
        let flags = if waitflag { WaitPidFlag::empty() } else { WaitPidFlag::WNOHANG };
        let status = loop {
            match waitpid(None, Some(flags)) {
                Ok(s) => break Some(s),
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => break None,
                Err(e) => {
                    warn!(error = %e, "waitpid failed, retrying");
                    continue;
                }
            }
        };

        let Some(status) = status else {
            if first {
                return None;
            }
            break;
        };
        first = false;

        let Some((pid, raw_status)) = decode_status(&status) else {
            // Non-blocking wait reported nothing ready (`StillAlive`).
            break;
        };

        let usage = accounting.poll(pid.as_raw()).await.unwrap_or_default();
        ctx.jobacct.aggregate(&usage);
        let _ = accounting.release(pid.as_raw()).await;

        let Some(task) = ctx.tasks.iter_mut().find(|t| t.pid == pid.as_raw()) else {
            debug!(pid = pid.as_raw(), "reaped pid with no matching task record");
            if waitflag {
                break;
            }
            continue;
        };
        task.mark_exited(raw_status);
        let local_id = task.local_id;
        matched += 1;

        run_task_epilog(task_epilog, local_id).await;
        run_task_epilog(task_epilog_site, local_id).await;

        if let Err(e) = spank.task_exit(local_id).await {
            warn!(error = %e, task = local_id, "spank_task_exit hook failed");
        }

        if waitflag {
            // One reaped child satisfies the blocking call.
            break;
        }
        // Non-blocking: keep draining until WNOHANG reports nothing left.
    }

    Some(matched)
}

/// Extract `(pid, raw_status)` from a decoded `WaitStatus`, or `None` for
/// `StillAlive`/`Continued`/other non-terminal variants.
fn decode_status(status: &WaitStatus) -> Option<(Pid, i32)> {
    match *status {
        WaitStatus::Exited(pid, code) => Some((pid, code << 8)),
        WaitStatus::Signaled(pid, signal, _core) => Some((pid, signal as i32)),
        _ => None,
    }
}

/// Run one task-epilog script if configured, with the task's local id as
/// its sole argument (spec §4.4: "user-supplied path (argv count 2)").
/// Failures are logged, never propagated — an epilog is best-effort
/// housekeeping, not part of the step's exit status.
async fn run_task_epilog(path: Option<&Path>, local_task: usize) {
    let Some(path) = path else { return };
    let path_buf: PathBuf = path.to_path_buf();
    match Command::new(&path_buf).arg(local_task.to_string()).status().await {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(?path_buf, ?status, task = local_task, "task epilog exited non-zero"),
        Err(e) => warn!(error = %e, ?path_buf, task = local_task, "failed to run task epilog"),
    }
}

/// `wait_for_all(ctx)` from spec §4.4: alternate a blocking reap with a
/// non-blocking drain, calling the exit batcher between waves until it has
/// nothing left to send. Exits when every task is complete or `reap`
/// returns `None` (no children left to wait for).
pub async fn wait_for_all(
    ctx: &mut StepContext,
    accounting: &dyn AccountingPlugin,
    spank: &dyn SpankPlugin,
    task_epilog: Option<&Path>,
    task_epilog_site: Option<&Path>,
    transport: &dyn Transport,
) {
    loop {
        let tasks_left = ctx.tasks.iter().filter(|t| !t.exited).count();
        if tasks_left == 0 {
            break;
        }

        if reap(ctx, true, accounting, spank, task_epilog, task_epilog_site).await.is_none() {
            break;
        }
        let _ = reap(ctx, false, accounting, spank, task_epilog, task_epilog_site).await;

        while batcher::send_pending(ctx, transport).await > 0 {}
    }
    while batcher::send_pending(ctx, transport).await > 0 {}
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
