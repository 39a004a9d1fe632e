// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step Manager Orchestrator (C9): drives the step's
//! `Init -> Starting -> Running -> Ending -> Complete` state machine,
//! sequencing C1-C8 and guaranteeing cleanup on every exit path (spec
//! §4.9).

use std::time::Duration;

use stepd_core::{CompletionState, OrchestratorState, StepContext, StepError};
use stepd_plugins::{
    AccountingPlugin, ContainerHandle, ContainerPlugin, PamPlugin, SpankPlugin, SwitchContext, SwitchPlugin,
};
use stepd_wire::Transport;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::NodeConfig;
use crate::error::OrchestratorError;
use crate::io::IoPump;
use crate::{batch, forker, launch_reply, privilege_cell, reaper, signals, tree};

/// Backoff cap for the straggler-kill retry loop (spec §4.9).
const STRAGGLER_KILL_MAX_BACKOFF: Duration = Duration::from_secs(120);
const STRAGGLER_KILL_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Every external collaborator the orchestrator drives but does not
/// implement (spec §2 Out of scope: plugin stack, message transport,
/// I/O threading). Bundled into one struct so `Orchestrator::new` doesn't
/// take eight separate lifetime-bound parameters.
pub struct OrchestratorDeps<'a> {
    pub config: &'a NodeConfig,
    pub container: &'a dyn ContainerPlugin,
    pub switch: &'a dyn SwitchPlugin,
    pub pam: &'a dyn PamPlugin,
    pub spank: &'a dyn SpankPlugin,
    pub accounting: &'a dyn AccountingPlugin,
    pub io: &'a dyn IoPump,
    pub transport: &'a dyn Transport,
}

/// Drives one step's lifecycle from launch-accepted to complete-reported.
pub struct Orchestrator<'a> {
    deps: OrchestratorDeps<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(deps: OrchestratorDeps<'a>) -> Self {
        Self { deps }
    }

    /// Run the full step lifecycle. `tree` is `Some` for non-batch steps
    /// participating in the reverse-tree completion protocol (spec §4.6's
    /// `rank >= 0`); `None` means "no tree", in which case C6 is skipped
    /// entirely (spec §3 `CompletionState` doc: "callers should not
    /// construct a `CompletionState` in that case at all").
    ///
    /// For batch steps, the caller is expected to have already staged the
    /// script (`batch::make_batch_dir` + `batch::materialize_script`) and
    /// set `ctx.argv`/`ctx.batch_dir` accordingly — this method only
    /// drives the run-and-report half of the batch variant (spec §4.7).
    ///
    /// Returns the return code substituted into the launch reply / batch
    /// completion message on a non-recoverable orchestration failure, or
    /// `0` on a normal completion (spec §7: task-level results, not this
    /// return value, determine `step_rc`).
    pub async fn run(&self, ctx: &mut StepContext, tree: Option<&CompletionState>) -> i32 {
        let span = info_span!("step", job_id = ctx.job_id.get(), step_id = ctx.step_id.get());
        self.run_inner(ctx, tree).instrument(span).await
    }

    async fn run_inner(&self, ctx: &mut StepContext, tree: Option<&CompletionState>) -> i32 {
        ctx.state = OrchestratorState::Starting;
        crate::startup::set_process_title(ctx.job_id.get(), ctx.step_id.get());
        crate::startup::restore_dumpable();
        let switch_ctx = SwitchContext {
            job_id: ctx.job_id.get(),
            step_id: ctx.step_id.get(),
            ntasks: ctx.ntasks,
            nnodes: ctx.nnodes,
        };

        // Init -> Starting: interconnect pre-init (non-batch), I/O setup,
        // interconnect init as target uid (spec §2 control flow, §4.9).
        if !ctx.is_batch {
            if let Err(e) = self.deps.switch.pre_init(&switch_ctx).await {
                return self.abort_pre_fork(ctx, StepError::InterconnectPreInit(e.0).into()).await;
            }
        }

        let io_setup = if ctx.is_spawn { self.deps.io.setup_spawn(ctx).await } else { self.deps.io.setup(ctx).await };
        if let Err(e) = io_setup {
            return self.abort_pre_fork(ctx, e).await;
        }

        if !ctx.is_batch {
            if let Err(e) = self.init_interconnect_as_user(ctx, &switch_ctx).await {
                self.deps.io.shutdown().await;
                let _ = self.deps.io.join().await;
                return self.abort_pre_fork(ctx, e).await;
            }
        }

        // Task Forker (C3). Skipped entirely for `ntasks == 0` (spec §8
        // boundary case): there is nothing to fork, and the reaper's
        // first `waitpid` will correctly report "no children" on its own.
        let pam_session = if ctx.ntasks == 0 {
            None
        } else {
            match forker::fork_all(
                ctx,
                self.deps.container,
                self.deps.pam,
                self.deps.spank,
                self.deps.accounting,
                &self.deps.config.pam_service,
            )
            .await
            {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "fork_all failed, cleaning up already-started tasks");
                    if let Some(container_id) = ctx.container_id.clone() {
                        self.kill_stragglers(&ContainerHandle(container_id)).await;
                    }
                    self.deps.io.shutdown().await;
                    let _ = self.deps.io.join().await;
                    return self.abort_pre_fork(ctx, e.into()).await;
                }
            }
        };

        // Starting -> Running: release the exec gate already happened
        // inside fork_all; close-on-parent-side fds likewise. Block the
        // manager's signal set now that children exist to inherit it
        // (spec §6 Signals), send the launch-success reply, and record
        // that this manager is live.
        ctx.state = OrchestratorState::Running;
        if let Err(e) = signals::block_manager_signals() {
            warn!(error = %e, "failed to block manager signal set");
        }
        launch_reply::send_launch_success(self.deps.transport, ctx, &self.deps.config.node_name, 0).await;
        info!(pid = std::process::id(), ntasks = ctx.ntasks, "step manager running");

        // Running -> Ending: reap every task, ending accounting polling
        // and PAM/interconnect for this node.
        reaper::wait_for_all(
            ctx,
            self.deps.accounting,
            self.deps.spank,
            self.deps.config.task_epilog.as_deref(),
            self.deps.config.task_epilog_site.as_deref(),
            self.deps.transport,
        )
        .await;
        ctx.state = OrchestratorState::Ending;

        if let Some(session) = pam_session {
            if let Err(e) = self.deps.pam.finish(session).await {
                warn!(error = %e, "PAM session finish failed, suppressing (process is about to exit)");
            }
        }
        if !ctx.is_batch {
            if let Err(e) = self.deps.switch.fini(&switch_ctx).await {
                warn!(error = %e, "interconnect fini failed");
            }
        }

        // Ending -> Complete: interconnect postfini, straggler kill, join
        // the I/O thread, plugin-stack fini, then report completion.
        if !ctx.is_batch {
            if let Err(e) = self.deps.switch.post_fini(&switch_ctx).await {
                warn!(error = %e, "interconnect post-fini failed");
            }
        }
        if let Some(container_id) = ctx.container_id.clone() {
            self.kill_stragglers(&ContainerHandle(container_id)).await;
        }
        self.deps.io.shutdown().await;
        if let Err(e) = self.deps.io.join().await {
            warn!(error = %e, "I/O thread join failed");
        }
        if let Err(e) = self.deps.spank.fini(ctx.job_id.get(), ctx.step_id.get()).await {
            warn!(error = %e, "plugin-stack fini failed");
        }

        ctx.state = OrchestratorState::Complete;
        self.report_completion(ctx, tree).await;
        0
    }

    /// "initializes interconnect as user uid" (spec §2 control flow):
    /// drop to the job's identity for the duration of the call, then
    /// reclaim — mirroring the RAII pattern `privilege_cell` provides for
    /// every other scoped privilege transition in this crate.
    async fn init_interconnect_as_user(
        &self,
        ctx: &StepContext,
        switch_ctx: &SwitchContext,
    ) -> Result<(), OrchestratorError> {
        let guard = privilege_cell::drop_privileges(
            ctx.user.uid,
            ctx.user.gid,
            ctx.user.supplementary_gids.as_deref(),
            &ctx.user.name,
            true,
        )?;
        let result = self.deps.switch.init(switch_ctx).await;
        guard.reclaim()?;
        result.map_err(|e| StepError::InterconnectInit(e.0).into())
    }

    /// Straggler kill (spec §4.9): `SIGKILL` the container, then loop
    /// `destroy`/`signal` with exponential backoff capped at 120s until
    /// `destroy` succeeds.
    async fn kill_stragglers(&self, handle: &ContainerHandle) {
        let _ = self.deps.container.signal(handle, libc::SIGKILL).await;
        let mut backoff = STRAGGLER_KILL_INITIAL_BACKOFF;
        loop {
            match self.deps.container.destroy(handle).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(error = %e, ?backoff, "container destroy failed, retrying");
                    let _ = self.deps.container.signal(handle, libc::SIGKILL).await;
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(STRAGGLER_KILL_MAX_BACKOFF);
                }
            }
        }
    }

    /// Pre-fork (and fork) failure path (spec §7): "abort the step, send
    /// a launch-failure reply, and return" — or, for batch steps, a
    /// non-zero `slurm_rc` in `RequestCompleteBatchScript` since there is
    /// no synchronous launch-reply client waiting (spec §4.8: success
    /// reply is skipped for batch; this crate extends that to the
    /// failure reply too, reporting failure via the batch-completion
    /// channel instead).
    async fn abort_pre_fork(&self, ctx: &mut StepContext, err: OrchestratorError) -> i32 {
        let rc = err.as_return_code();
        error!(error = %err, "step manager aborted before any task was forked");

        if ctx.is_batch {
            // Route through `batch_finish`, not `send_batch_complete`
            // directly: the spool directory was already staged before the
            // orchestrator ran (main.rs), and invariant 6 requires it be
            // removed before the completion message is considered
            // delivered, exactly as the normal-completion path does.
            let script_path = ctx.batch_dir.as_ref().map(|dir| dir.join("script"));
            if let Err(send_err) = batch::batch_finish(
                ctx,
                script_path.as_deref(),
                &self.deps.config.node_name,
                rc,
                self.deps.transport,
                self.deps.config.controller_addr,
                self.deps.config.batch_max_retry,
                self.deps.config.batch_retry_delay,
            )
            .await
            {
                error!(error = %send_err, "failed to report batch launch failure to controller");
            }
        } else {
            for client in &ctx.clients {
                if let Some(addr) = client.resp_addr {
                    launch_reply::send_launch_failure(
                        self.deps.transport,
                        addr,
                        &self.deps.config.node_name,
                        ctx.node_id,
                        rc,
                    )
                    .await;
                }
            }
        }
        ctx.state = OrchestratorState::Complete;
        rc
    }

    /// Emit completion: the batch-completion report (C7) for batch steps,
    /// or the reverse-tree completion protocol (C6) otherwise (spec §4.9
    /// `Ending -> Complete`).
    async fn report_completion(&self, ctx: &mut StepContext, tree: Option<&CompletionState>) {
        if ctx.is_batch {
            let script_path = ctx.batch_dir.as_ref().map(|dir| dir.join("script"));
            if let Err(e) = batch::batch_finish(
                ctx,
                script_path.as_deref(),
                &self.deps.config.node_name,
                0,
                self.deps.transport,
                self.deps.config.controller_addr,
                self.deps.config.batch_max_retry,
                self.deps.config.batch_retry_delay,
            )
            .await
            {
                error!(error = %e, "batch completion report failed after exhausting retries");
            }
            return;
        }

        let Some(tree) = tree else { return };

        let max_local_rc = ctx.tasks.iter().map(|t| t.wexitstatus()).max().unwrap_or(0);
        tree.fold_local_rc(max_local_rc);
        tree.fold_local_jobacct(&ctx.jobacct);
        tree::wait_and_emit(
            tree,
            ctx.job_id,
            ctx.step_id,
            self.deps.transport,
            self.deps.config.children_timeout,
            self.deps.config.parent_retry,
            self.deps.config.controller_addr,
        )
        .await;
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
