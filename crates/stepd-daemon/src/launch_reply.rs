// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launch Reply (C8): send the initiating client a failure or success
//! response to its `LaunchTasks`/`BatchJobLaunch` request (spec §4.8).

use std::net::SocketAddr;

use stepd_core::{NodeId, StepContext};
use stepd_wire::{OutboundMessage, Transport};
use tracing::warn;

/// Failure reply: always carries a non-zero return code, delivered
/// fire-and-forget to the originating response port (spec §4.8). `rc == 0`
/// is coerced to `-1` — a zero code would misreport the failure path.
pub async fn send_launch_failure(
    transport: &dyn Transport,
    resp_addr: SocketAddr,
    node_name: &str,
    srun_node_id: NodeId,
    rc: i32,
) {
    let return_code = if rc == 0 { -1 } else { rc };
    let msg = OutboundMessage::LaunchFailure {
        node_name: node_name.to_string(),
        srun_node_id,
        return_code,
    };
    if let Err(e) = transport.send(resp_addr, &msg).await {
        warn!(error = %e, %resp_addr, "failed to deliver launch-failure reply");
    }
}

/// Success reply: carries the full local pid list, skipped entirely for
/// batch and spawn steps (spec §4.8).
pub async fn send_launch_success(
    transport: &dyn Transport,
    ctx: &StepContext,
    node_name: &str,
    rc: i32,
) {
    if ctx.is_batch || ctx.is_spawn {
        return;
    }
    let local_pids: Vec<i32> = ctx.tasks.iter().map(|t| t.pid).collect();
    let msg = OutboundMessage::LaunchSuccess {
        node_name: node_name.to_string(),
        srun_node_id: ctx.node_id,
        return_code: rc,
        local_pids,
    };
    for client in &ctx.clients {
        let Some(resp_addr) = client.resp_addr else { continue };
        if let Err(e) = transport.send(resp_addr, &msg).await {
            warn!(error = %e, %resp_addr, "failed to deliver launch-success reply");
        }
    }
}

#[cfg(test)]
#[path = "launch_reply_tests.rs"]
mod tests;
