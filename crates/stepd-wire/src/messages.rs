// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages exchanged between the step manager, the node daemon, peer
//! managers and the controller (spec §6).

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stepd_core::{JobAcct, JobId, NodeId, StepId};

/// Tree topology handed down with a launch request: this node's position
/// in the reverse-tree overlay (spec §3 `CompletionState`, §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TreeTopology {
    pub rank: i64,
    pub parent_rank: i64,
    pub parent_addr: Option<SocketAddr>,
    pub children: usize,
    pub depth: u32,
    pub max_depth: u32,
}

/// Messages consumed by the step manager, delivered by the node daemon
/// (spec §6 "Messages consumed").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StepRequest {
    LaunchTasks {
        job_id: JobId,
        step_id: StepId,
        ntasks: usize,
        nnodes: usize,
        uid: u32,
        gid: u32,
        cwd: PathBuf,
        env: Vec<(String, String)>,
        argv: Vec<String>,
        resp_ports: Vec<SocketAddr>,
        tree: TreeTopology,
    },
    BatchJobLaunch {
        job_id: JobId,
        step_id: StepId,
        uid: u32,
        script_bytes: Vec<u8>,
        nprocs: usize,
        cpu_groups: Vec<u32>,
        nodes: usize,
    },
    /// Interactive rendezvous variant (spec §6); shares the launch pipeline
    /// minus the launch-success reply (spec §4.8).
    SpawnTask {
        job_id: JobId,
        step_id: StepId,
        ntasks: usize,
        uid: u32,
        gid: u32,
        cwd: PathBuf,
        env: Vec<(String, String)>,
        argv: Vec<String>,
        resp_ports: Vec<SocketAddr>,
    },
}

/// `MessageTaskExit{task_ids[], num_tasks, return_code}` (spec §4.5, §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageTaskExit {
    pub task_ids: Vec<u32>,
    pub num_tasks: usize,
    pub return_code: i32,
}

/// `RequestStepComplete{...}` sent to the parent rank or the controller
/// (spec §4.6, §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestStepComplete {
    pub job_id: JobId,
    pub step_id: StepId,
    pub range_first: i64,
    pub range_last: i64,
    pub step_rc: i32,
    pub jobacct: JobAcct,
}

/// `RequestCompleteBatchScript{...}` sent to the controller (spec §4.7, §6,
/// batch only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestCompleteBatchScript {
    pub job_id: JobId,
    pub slurm_rc: i32,
    pub job_rc: i32,
    pub node_name: String,
}

/// Every message shape the step manager can produce, unified so a single
/// `Transport` trait (see `transport.rs`) can carry both the fire-and-forget
/// and request/reply deliveries spec §4.6/§4.7/§4.8 call for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// `LaunchTasksResponse` on the failure path (spec §4.8): non-zero
    /// `return_code` always, fire-and-forget to the client's response port.
    LaunchFailure { node_name: String, srun_node_id: NodeId, return_code: i32 },
    /// `LaunchTasksResponse` on the success path (spec §4.8): carries the
    /// full local pid list, skipped for batch/spawn steps.
    LaunchSuccess { node_name: String, srun_node_id: NodeId, return_code: i32, local_pids: Vec<i32> },
    TaskExit(MessageTaskExit),
    StepComplete(RequestStepComplete),
    CompleteBatchScript(RequestCompleteBatchScript),
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
