// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `stepd` — the per-step-per-node supervisor binary. One invocation is
//! forked by the node daemon for each `LaunchTasks`, `BatchJobLaunch`, or
//! `SpawnTask` request (spec §1); the request itself arrives framed on
//! stdin, mirroring the fd the parent daemon hands the child across the
//! fork (request dispatch is out of scope per spec §2, the one request
//! this process needs is not).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use stepd_core::{
    ClientLink, CompletionState, Environment, GlobalTaskId, JobAcct, OrchestratorState, StepContext, TaskRecord,
    UserIdentity,
};
use stepd_plugins::{
    NoopAccountingPlugin, NoopContainerPlugin, NoopPamPlugin, NoopSpankPlugin, NoopSwitchPlugin,
};
use stepd_wire::{StepRequest, TcpTransport, TreeTopology};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stepd_daemon::io::NoopIoPump;
use stepd_daemon::orchestrator::{Orchestrator, OrchestratorDeps};
use stepd_daemon::{batch, NodeConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = match NodeConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load node configuration");
            return ExitCode::FAILURE;
        }
    };

    let request = match read_request().await {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "failed to read step request from the node daemon");
            return ExitCode::FAILURE;
        }
    };

    let (mut ctx, tree) = match build_context(request, &config) {
        Ok(built) => built,
        Err(e) => {
            error!(error = %e, "failed to stage the step before handing it to the orchestrator");
            return ExitCode::FAILURE;
        }
    };

    let container = NoopContainerPlugin;
    let switch = NoopSwitchPlugin;
    let pam = NoopPamPlugin;
    let spank = NoopSpankPlugin;
    let accounting = NoopAccountingPlugin;
    let io = NoopIoPump;
    let transport = TcpTransport::new();

    let deps = OrchestratorDeps {
        config: &config,
        container: &container,
        switch: &switch,
        pam: &pam,
        spank: &spank,
        accounting: &accounting,
        io: &io,
        transport: &transport,
    };

    info!(job_id = ctx.job_id.get(), step_id = ctx.step_id.get(), ntasks = ctx.ntasks, "step manager starting");
    let rc = Orchestrator::new(deps).run(&mut ctx, tree.as_ref()).await;
    info!(rc, "step manager exiting");

    if rc == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Read the one `StepRequest` this invocation handles off stdin, using the
/// same length-prefixed JSON framing every other wire message uses.
async fn read_request() -> Result<StepRequest, stepd_wire::ProtocolError> {
    let mut stdin = tokio::io::stdin();
    stepd_wire::read_framed(&mut stdin).await
}

/// Translate the inbound request into a `StepContext` (and, for the
/// non-batch/non-spawn case, the `CompletionState` backing the reverse-tree
/// completion protocol), staging the batch spool directory up front when
/// the request calls for one (spec §4.7: spool directory and script exist
/// before the orchestrator's state machine starts).
fn build_context(
    request: StepRequest,
    config: &NodeConfig,
) -> Result<(StepContext, Option<CompletionState>), stepd_core::StepError> {
    match request {
        StepRequest::LaunchTasks {
            job_id,
            step_id,
            ntasks,
            nnodes,
            uid,
            gid,
            cwd,
            env,
            argv,
            resp_ports,
            tree,
        } => {
            let ctx = base_context(
                job_id,
                step_id,
                stepd_core::NodeId::new(tree.rank.max(0) as u32),
                ntasks,
                nnodes,
                false,
                false,
                uid,
                gid,
                cwd,
                env,
                argv,
                resp_ports,
            );
            let completion = build_completion_state(&tree);
            Ok((ctx, completion))
        }
        StepRequest::SpawnTask { job_id, step_id, ntasks, uid, gid, cwd, env, argv, resp_ports } => {
            let ctx = base_context(
                job_id,
                step_id,
                stepd_core::NodeId::new(0),
                ntasks,
                1,
                false,
                true,
                uid,
                gid,
                cwd,
                env,
                argv,
                resp_ports,
            );
            Ok((ctx, None))
        }
        StepRequest::BatchJobLaunch { job_id, step_id, uid, script_bytes, nprocs, cpu_groups, nodes } => {
            info!(
                job_id = job_id.get(),
                cpu_groups = %stepd_daemon::startup::sprint_task_cnt(&cpu_groups),
                "batch job launch received"
            );
            let mut ctx = base_context(
                job_id,
                step_id,
                stepd_core::NodeId::new(0),
                nprocs,
                nodes,
                true,
                false,
                uid,
                uid,
                PathBuf::from("/"),
                Vec::new(),
                Vec::new(),
                Vec::new(),
            );
            let batch_dir = batch::make_batch_dir(&ctx, &config.spool_dir)?;
            let script_path = batch::materialize_script(&script_bytes, &batch_dir, uid)?;
            ctx.argv = vec![script_path.display().to_string()];
            ctx.batch_dir = Some(batch_dir);
            Ok((ctx, None))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn base_context(
    job_id: stepd_core::JobId,
    step_id: stepd_core::StepId,
    node_id: stepd_core::NodeId,
    ntasks: usize,
    nnodes: usize,
    is_batch: bool,
    is_spawn: bool,
    uid: u32,
    gid: u32,
    cwd: PathBuf,
    env: Vec<(String, String)>,
    argv: Vec<String>,
    resp_ports: Vec<SocketAddr>,
) -> StepContext {
    let mut environment = Environment::new();
    for (k, v) in env {
        environment.set(k, v);
    }

    let tasks = (0..ntasks).map(|i| TaskRecord::new(i, GlobalTaskId::new(i as u32))).collect();
    let clients =
        resp_ports.into_iter().map(|addr| ClientLink { client_addr: addr, resp_addr: Some(addr) }).collect();

    StepContext {
        job_id,
        step_id,
        node_id,
        ntasks,
        nnodes,
        is_batch,
        is_spawn,
        debug_level: 0,
        user: resolve_user(uid, gid),
        container_id: None,
        tasks,
        env: environment,
        clients,
        argv,
        pgid: None,
        cwd,
        batch_dir: None,
        state: OrchestratorState::Init,
        jobacct: JobAcct::default(),
    }
}

/// Resolve the job user's passwd-database record. The wire protocol only
/// carries `uid`/`gid` (spec §6); name and home directory come from this
/// node's own `/etc/passwd`, matching the controller's own resolved
/// record since UIDs are shared across the cluster. Falls back to the raw
/// uid as the name if the local passwd database has no entry, rather than
/// failing the step over a lookup this crate doesn't strictly need.
fn resolve_user(uid: u32, gid: u32) -> UserIdentity {
    match nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid)) {
        Ok(Some(user)) => UserIdentity { uid, gid, name: user.name, home: user.dir, supplementary_gids: None },
        Ok(None) | Err(_) => {
            UserIdentity { uid, gid, name: uid.to_string(), home: PathBuf::from("/"), supplementary_gids: None }
        }
    }
}

fn build_completion_state(topology: &TreeTopology) -> Option<CompletionState> {
    if topology.rank < 0 {
        return None;
    }
    Some(CompletionState::new(
        topology.rank,
        topology.parent_rank,
        topology.parent_addr,
        topology.children,
        topology.depth,
        topology.max_depth,
    ))
}
