// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion Tree (C6): wait for children to report, emit contiguous
//! completion ranges to the parent rank (or the controller root), retrying
//! and falling back on transport failure (spec §4.6).

use std::net::SocketAddr;
use std::time::Duration;

use stepd_core::{CompletionRange, CompletionState, JobId, StepId};
use stepd_wire::{OutboundMessage, RequestStepComplete, Transport};
use tracing::{info, warn};

/// One second between parent-rank retry attempts (spec §4.6).
const PARENT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Request/reply budget for a single parent-rank or controller attempt
/// (spec §4.6: "a 10-second budget").
const PARENT_RETRY_BUDGET: Duration = Duration::from_secs(10);

/// Wait for children (bounded, spec §4.6/§5), then emit every resulting
/// range to the parent rank or the controller, falling back to the
/// controller if the parent is unreachable after `parent_retry` attempts.
/// Logs the count of orphaned ranks on a timed-out wait (invariant 4's
/// "ranks missing due to timeout are the only exception and must be
/// logged").
pub async fn wait_and_emit(
    state: &CompletionState,
    job_id: JobId,
    step_id: StepId,
    transport: &dyn Transport,
    children_timeout: Duration,
    parent_retry: u32,
    controller_addr: SocketAddr,
) {
    use stepd_core::WaitOutcome;

    match state.wait_for_children(children_timeout) {
        WaitOutcome::NoChildren | WaitOutcome::AllReceived => {}
        WaitOutcome::TimedOut { missing } => {
            warn!(missing, rank = state.rank(), "completion tree wait timed out, emitting partial ranges");
        }
    }

    let ranges = state.emit();
    for range in ranges {
        emit_one(state, job_id, step_id, range, transport, parent_retry, controller_addr).await;
    }
}

async fn emit_one(
    state: &CompletionState,
    job_id: JobId,
    step_id: StepId,
    range: CompletionRange,
    transport: &dyn Transport,
    parent_retry: u32,
    controller_addr: SocketAddr,
) {
    let msg = OutboundMessage::StepComplete(RequestStepComplete {
        job_id,
        step_id,
        range_first: range.first,
        range_last: range.last,
        step_rc: range.step_rc,
        jobacct: range.jobacct,
    });

    let parent_rank = state.parent_rank();
    if parent_rank == -1 {
        send_to_controller(&msg, transport, controller_addr).await;
        return;
    }

    let Some(parent_addr) = state.parent_addr() else {
        warn!(parent_rank, "no parent address recorded, falling back to controller");
        send_to_controller(&msg, transport, controller_addr).await;
        return;
    };

    for attempt in 1..=parent_retry.max(1) {
        match transport.request(parent_addr, &msg, PARENT_RETRY_BUDGET).await {
            Ok(code) if code.is_success() => return,
            Ok(code) => {
                warn!(?code, attempt, %parent_addr, "parent rank rejected step-complete message");
                return;
            }
            Err(e) => {
                warn!(error = %e, attempt, %parent_addr, "step-complete send to parent rank failed");
                if attempt < parent_retry.max(1) {
                    tokio::time::sleep(PARENT_RETRY_DELAY).await;
                }
            }
        }
    }

    info!(%parent_addr, "parent rank unreachable after all retries, falling back to controller");
    send_to_controller(&msg, transport, controller_addr).await;
}

async fn send_to_controller(msg: &OutboundMessage, transport: &dyn Transport, controller_addr: SocketAddr) {
    match transport.request(controller_addr, msg, PARENT_RETRY_BUDGET).await {
        Ok(code) if code.is_success() => {}
        Ok(code) => warn!(?code, %controller_addr, "controller rejected step-complete message"),
        Err(e) => warn!(error = %e, %controller_addr, "step-complete send to controller failed"),
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
