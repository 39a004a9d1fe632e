// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task Forker (C3): fork every local task, place it in the step's process
//! group and container, gate its exec on the parent finishing registration
//! (spec §4.3).

use std::ffi::CString;
use std::os::fd::AsRawFd;

use nix::unistd::{self, ForkResult, Pid, Uid};
use stepd_core::{StepContext, StepError, StepResult};
use stepd_plugins::{AccountingPlugin, ContainerPlugin, PamPlugin, PamSession, SpankPlugin};
use tracing::{debug, warn};

use crate::pipes::{self, GatePipe};
use crate::privilege_cell;
use crate::signals;

/// Environment variable carrying the requested `nice` offset for a task
/// (spec §4.3 step 9b, §6 Environment).
const ENV_PRIO_PROCESS: &str = "SLURM_PRIO_PROCESS";

/// `fork_all(ctx)` from spec §4.3. On success every `TaskRecord::pid` is
/// populated and every task is blocked on its exec gate, ready for the
/// orchestrator to release it. Returns the open PAM session: the caller
/// (the orchestrator) owns its lifetime from here and finishes it during
/// the `Ending` stage (spec §4.9 "Running -> Ending").
#[allow(unsafe_code)]
#[allow(clippy::too_many_arguments)]
pub async fn fork_all(
    ctx: &mut StepContext,
    container: &dyn ContainerPlugin,
    pam: &dyn PamPlugin,
    spank: &dyn SpankPlugin,
    accounting: &dyn AccountingPlugin,
    pam_service: &str,
) -> StepResult<PamSession> {
    // Step 1: container create.
    let container_handle = container
        .create(ctx.job_id.get(), ctx.step_id.get())
        .await
        .map_err(|e| StepError::ContainerCreate(e.0))?;
    ctx.container_id = Some(container_handle.0.clone());

    // Step 2: plugin-stack init.
    spank.init(ctx.job_id.get(), ctx.step_id.get()).await.map_err(|e| StepError::PluginInit(e.0))?;

    // Step 3: pipe pair array.
    let pipes = pipes::allocate(ctx.ntasks)?;

    // Step 4: drop privileges, euid stays root so PAM can run.
    let guard = privilege_cell::drop_privileges(
        ctx.user.uid,
        ctx.user.gid,
        ctx.user.supplementary_gids.as_deref(),
        &ctx.user.name,
        false,
    )?;

    // Step 5: PAM session setup.
    let pam_session = match pam.setup(&ctx.user.name, pam_service).await {
        Ok(session) => session,
        Err(e) => {
            let _ = guard.reclaim();
            return Err(StepError::PamSetup(e.0));
        }
    };

    // Step 6: seteuid(target_uid) to match user identity for cwd checks.
    if let Err(e) = unistd::seteuid(Uid::from_raw(ctx.user.uid)) {
        let _ = pam.finish(pam_session).await;
        let _ = guard.reclaim();
        return Err(StepError::PrivilegeDrop(format!("seteuid(target): {e}")));
    }

    // Step 7: chdir to job cwd, falling back to /tmp (Design Notes §9: log,
    // don't silently swallow).
    match privilege_cell::chdir_job_or_tmp(&ctx.cwd) {
        Ok(dir) => {
            if dir != ctx.cwd {
                warn!(requested = %ctx.cwd.display(), entered = %dir.display(), "chdir to job cwd failed, falling back to /tmp");
            }
        }
        Err(e) => {
            let _ = pam.finish(pam_session).await;
            let _ = guard.reclaim();
            return Err(e);
        }
    }

    // Step 8: spank_user.
    if let Err(e) = spank.user_init(ctx.job_id.get(), ctx.step_id.get()).await {
        let _ = pam.finish(pam_session).await;
        let _ = guard.reclaim();
        return Err(StepError::PluginUserHook(e.0));
    }

    // Step 9: fork every local task.
    let argv: Vec<CString> =
        ctx.argv.iter().map(|s| CString::new(s.as_str()).expect("argv entry contains a NUL byte")).collect();
    let envp: Vec<CString> = ctx
        .env
        .to_assignment_strings()
        .into_iter()
        .map(|s| CString::new(s).expect("env entry contains a NUL byte"))
        .collect();
    let prio = ctx.env.get(ENV_PRIO_PROCESS).and_then(|v| v.parse::<i32>().ok());
    ctx.env.remove(ENV_PRIO_PROCESS);

    let mut guard = guard;
    let mut pgid: Option<Pid> = None;

    for i in 0..ctx.ntasks {
        // SAFETY: the child branch only calls async-signal-safe operations
        // (close, setpriority, setregid/setreuid, sigprocmask, execve) or
        // terminates via `exit`; it never returns into the async runtime.
        let outcome = unsafe { unistd::fork() };
        match outcome {
            Ok(ForkResult::Child) => {
                pipes::close_unowned_ends(&pipes, i);
                if let Some(nice) = prio {
                    // SAFETY: setpriority is async-signal-safe; pid 0 means
                    // "this process".
                    unsafe {
                        libc::setpriority(libc::PRIO_PROCESS as libc::c_int, 0, nice as libc::c_int);
                    }
                }
                if let Err(e) = guard.become_user(ctx.user.uid, ctx.user.gid) {
                    eprintln!("stepd: task {i} failed to become job user: {e}");
                    std::process::exit(1);
                }
                signals::unblock_manager_signals();
                exec_task(&pipes[i], &argv, &envp, i);
            }
            Ok(ForkResult::Parent { child }) => {
                if let Err(e) = unistd::close(pipes[i].read_end.as_raw_fd()) {
                    debug!(error = %e, task = i, "closing child's read end failed");
                }
                ctx.tasks[i].pid = child.as_raw();
                if i == 0 {
                    pgid = Some(child);
                }
            }
            Err(e) => {
                let _ = pam.finish(pam_session).await;
                let _ = guard.reclaim();
                return Err(StepError::Fork(format!("fork failed for task {i}: {e}")));
            }
        }
    }

    // Step 10: reclaim privileges, restore the manager's own cwd from
    // before the drop (spec §4.3 step 10; original `chdir(sprivs.saved_cwd)`).
    let saved_cwd = guard.saved_cwd().to_path_buf();
    guard.reclaim()?;
    if nix::unistd::chdir(&saved_cwd).is_err() {
        // Best effort; the orchestrator's later stages don't depend on cwd.
    }

    // Step 11: process group, container membership, accounting registration,
    // post-fork spank hook, for every task in fork order.
    let Some(pgid) = pgid else {
        let _ = pam.finish(pam_session).await;
        return Err(StepError::Fork("no tasks were forked (ntasks == 0)".into()));
    };
    for i in 0..ctx.ntasks {
        let pid = Pid::from_raw(ctx.tasks[i].pid);
        if let Err(e) = unistd::setpgid(pid, pgid) {
            warn!(error = %e, task = i, "setpgid failed");
        }
        if let Err(e) = container.add(&container_handle, pid.as_raw()).await {
            let _ = pam.finish(pam_session).await;
            return Err(StepError::ContainerAdd {
                pid: pid.as_raw(),
                source: Box::new(StepError::PluginInit(e.0)),
            });
        }
        let _ = accounting.register_pid(pid.as_raw()).await;
        if let Err(e) = spank.task_post_fork(i, pid.as_raw()).await {
            let _ = pam.finish(pam_session).await;
            return Err(StepError::PluginPostFork { task: i, reason: e.0 });
        }
    }
    ctx.pgid = Some(pgid.as_raw());

    // Step 12: release every task's exec gate.
    for (i, pipe) in pipes.iter().enumerate() {
        let byte = [1u8];
        // SAFETY: `write_end` is a valid, open fd owned by this process for
        // the lifetime of `pipe`; the buffer is exactly the byte written.
        let n = unsafe { libc::write(pipe.write_end.as_raw_fd(), byte.as_ptr().cast(), 1) };
        if n != 1 {
            warn!(task = i, "failed to write exec-gate byte");
        }
        ctx.tasks[i].state = stepd_core::TaskState::Started;
        debug!(task = i, "exec gate released");
    }

    // Step 13: pipe storage drops here, closing every remaining fd.
    drop(pipes);

    Ok(pam_session)
}

/// In the forked child: read the exec gate, then `execve` the program
/// image. Never returns; on any failure it prints to stderr and calls
/// `exit(1)` (spec §4.3: "Child-side failures call exit(1) (never
/// return)").
#[allow(unsafe_code)]
fn exec_task(pipe: &GatePipe, argv: &[CString], envp: &[CString], local_task: usize) -> ! {
    let mut gate_byte = [0u8; 1];
    // SAFETY: `read_end` is a valid, open fd owned by this process for the
    // lifetime of `pipe`; the buffer is sized to the single byte requested.
    let n = unsafe { libc::read(pipe.read_end.as_raw_fd(), gate_byte.as_mut_ptr().cast(), 1) };
    if n != 1 {
        eprintln!("stepd: task {local_task} failed to read exec gate");
        std::process::exit(1);
    }

    if argv.is_empty() {
        eprintln!("stepd: task {local_task} has no argv to exec");
        std::process::exit(1);
    }

    match unistd::execve(&argv[0], argv, envp) {
        Ok(_) => unreachable!("execve does not return on success"),
        Err(e) => {
            eprintln!("stepd: task {local_task} exec of {:?} failed: {e}", argv[0]);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
#[path = "forker_tests.rs"]
mod tests;
