// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit Batcher (C5): coalesce pending task exits sharing a status into one
//! `MessageTaskExit` per distinct status, per send pass (spec §4.5).

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use stepd_core::StepContext;
use stepd_wire::{MessageTaskExit, OutboundMessage, Transport};
use tracing::warn;

/// `nnodes` above which sends get a desynchronizing pre-send delay (spec
/// §4.5: "very wide steps").
const WIDE_STEP_THRESHOLD: usize = 100;

/// Scan `TaskRecords` for exited-but-unsent tasks, batch by identical exit
/// status, and emit one `TaskExit` message per batch to every client
/// response endpoint with a non-zero address family. Returns the number of
/// tasks whose `exit_sent` flag was flipped this call.
pub async fn send_pending(ctx: &mut StepContext, transport: &dyn Transport) -> usize {
    maybe_desync_delay(ctx).await;

    let mut sent = 0usize;
    loop {
        let Some(status) = ctx.tasks.iter().find(|t| t.exited && !t.exit_sent).map(|t| t.exit_status) else {
            break;
        };

        let mut task_ids = Vec::new();
        for task in ctx.tasks.iter_mut() {
            if task.exited && !task.exit_sent && task.exit_status == status {
                task.exit_sent = true;
                task_ids.push(task.global_id.get());
            }
        }
        if task_ids.is_empty() {
            break;
        }

        let msg = OutboundMessage::TaskExit(MessageTaskExit {
            num_tasks: task_ids.len(),
            return_code: status,
            task_ids: task_ids.clone(),
        });
        sent += task_ids.len();

        for client in &ctx.clients {
            let Some(resp_addr) = client.resp_addr else { continue };
            if let Err(e) = transport.send(resp_addr, &msg).await {
                warn!(error = %e, %resp_addr, "failed to deliver task-exit message");
            }
        }
    }
    sent
}

/// Bounded random pre-send delay, seeded by `(job_id, node_id)` so every
/// step manager for the same step computes a different but reproducible
/// jitter, desynchronizing simultaneous TCP closes on wide steps (spec
/// §4.5).
async fn maybe_desync_delay(ctx: &StepContext) {
    if ctx.nnodes <= WIDE_STEP_THRESHOLD {
        return;
    }
    let seed = desync_seed(ctx.job_id.get(), ctx.node_id.get());
    let mut rng = StdRng::seed_from_u64(seed);
    let max_ms = 3 * ctx.nnodes as u64;
    let delay_ms = rng.gen_range(0..=max_ms);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

fn desync_seed(job_id: u32, node_id: u32) -> u64 {
    (u64::from(job_id) << 32) | u64::from(node_id)
}

#[cfg(test)]
#[path = "batcher_tests.rs"]
mod tests;
