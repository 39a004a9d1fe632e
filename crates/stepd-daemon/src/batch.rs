// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch Subsystem (C7): spool-directory creation, script materialization
//! with strict permissions, retrying completion report (spec §4.7).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::unistd::{chown, Gid, Uid};
use stepd_core::{StepContext, StepError, StepResult};
use stepd_wire::{OutboundMessage, RequestCompleteBatchScript, Transport};
use tracing::{info, warn};

/// `MAX_RETRY` for the batch-completion RPC (spec §4.7).
pub const MAX_RETRY: u32 = 240;
/// `RETRY_DELAY` between batch-completion attempts (spec §4.7).
pub const RETRY_DELAY: Duration = Duration::from_secs(15);

/// `make_batch_dir(ctx)`: `"{spool}/job{job:05}[.{step:05}]"`, mode
/// `0750`, owned `(root, target_gid)` (spec §4.7, §6).
pub fn make_batch_dir(ctx: &StepContext, spool_dir: &Path) -> StepResult<PathBuf> {
    let path = spool_dir.join(ctx.batch_dir_name());

    match fs::create_dir(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(source) => return Err(StepError::BatchDirCreate { path: path.display().to_string(), source }),
    }

    chown(&path, None, Some(Gid::from_raw(ctx.user.gid)))
        .map_err(|e| StepError::BatchDirCreate { path: path.display().to_string(), source: to_io(e) })?;
    fs::set_permissions(&path, std::os::unix::fs::PermissionsExt::from_mode(0o750))
        .map_err(|source| StepError::BatchDirCreate { path: path.display().to_string(), source })?;

    Ok(path)
}

/// `materialize_script(msg, path)`: `"{path}/script"`, exclusive-create
/// (retrying once past an `EEXIST` by unlinking the stale file), owned by
/// the job user, mode `0500` (spec §4.7, §6, §8 invariant 5).
pub fn materialize_script(script_bytes: &[u8], batch_dir: &Path, uid: u32) -> StepResult<PathBuf> {
    let script_path = batch_dir.join("script");

    let mut attempts = 0;
    let mut file = loop {
        let result = OpenOptions::new().write(true).create_new(true).mode(0o700).open(&script_path);
        match result {
            Ok(f) => break f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempts == 0 => {
                attempts += 1;
                fs::remove_file(&script_path).map_err(|source| StepError::BatchScriptCreate {
                    path: script_path.display().to_string(),
                    source,
                })?;
                continue;
            }
            Err(source) => {
                return Err(StepError::BatchScriptCreate { path: script_path.display().to_string(), source })
            }
        }
    };

    file.write_all(script_bytes)
        .map_err(|source| StepError::BatchScriptCreate { path: script_path.display().to_string(), source })?;
    drop(file);

    chown(&script_path, Some(Uid::from_raw(uid)), None).map_err(|e| StepError::BatchScriptChownChmod {
        path: script_path.display().to_string(),
        source: to_io(e),
    })?;
    fs::set_permissions(&script_path, std::os::unix::fs::PermissionsExt::from_mode(0o500)).map_err(
        |source| StepError::BatchScriptChownChmod { path: script_path.display().to_string(), source },
    )?;

    Ok(script_path)
}

/// `send_batch_complete(ctx, slurm_rc, job_rc)`: request/reply to the
/// controller, retrying up to `MAX_RETRY` times at `RETRY_DELAY` cadence on
/// transport failure. `AlreadyDone`/`InvalidJobId` collapse to success; any
/// other non-zero reply propagates as `TransportExhausted`.
pub async fn send_batch_complete(
    ctx: &StepContext,
    node_name: &str,
    slurm_rc: i32,
    job_rc: i32,
    transport: &dyn Transport,
    controller_addr: std::net::SocketAddr,
    max_retry: u32,
    retry_delay: Duration,
) -> StepResult<()> {
    let msg = OutboundMessage::CompleteBatchScript(RequestCompleteBatchScript {
        job_id: ctx.job_id,
        slurm_rc,
        job_rc,
        node_name: node_name.to_string(),
    });

    for attempt in 1..=max_retry.max(1) {
        match transport.request(controller_addr, &msg, Duration::from_secs(10)).await {
            Ok(code) if code.is_success() => return Ok(()),
            Ok(code) => {
                warn!(?code, attempt, "controller rejected batch-completion message");
                return Err(StepError::TransportExhausted { max_retry });
            }
            Err(e) => {
                warn!(error = %e, attempt, max_retry, "batch-completion send failed, retrying");
                if attempt < max_retry.max(1) {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    Err(StepError::TransportExhausted { max_retry })
}

/// `batch_finish(ctx, rc)`: unlink the materialized script, `rmdir` the
/// batch directory, then report completion carrying both the transport
/// result and task 0's exit status (spec §4.7, invariant 6).
pub async fn batch_finish(
    ctx: &mut StepContext,
    script_path: Option<&Path>,
    node_name: &str,
    rc: i32,
    transport: &dyn Transport,
    controller_addr: std::net::SocketAddr,
    max_retry: u32,
    retry_delay: Duration,
) -> StepResult<()> {
    if let Some(script_path) = script_path {
        if let Err(e) = fs::remove_file(script_path) {
            warn!(error = %e, ?script_path, "failed to unlink batch script");
        }
    }
    if let Some(batch_dir) = ctx.batch_dir.take() {
        if let Err(e) = fs::remove_dir(&batch_dir) {
            warn!(error = %e, ?batch_dir, "failed to remove batch directory");
        }
    }

    let job_rc = ctx.tasks.first().map(|t| t.wexitstatus()).unwrap_or(0);
    info!(slurm_rc = rc, job_rc, "reporting batch completion");
    send_batch_complete(ctx, node_name, rc, job_rc, transport, controller_addr, max_retry, retry_delay).await
}

fn to_io(e: nix::Error) -> std::io::Error {
    std::io::Error::from_raw_os_error(e as i32)
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
