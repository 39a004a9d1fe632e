// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixtures for this crate's unit tests. Not part of the
//! public API; included only under `#[cfg(test)]`.

use std::time::Duration;

use stepd_core::{
    ClientLink, Environment, GlobalTaskId, JobAcct, JobId, NodeId, OrchestratorState, StepContext,
    StepId, TaskRecord, UserIdentity,
};

use crate::config::NodeConfig;

pub fn test_context(ntasks: usize) -> StepContext {
    let tasks = (0..ntasks).map(|i| TaskRecord::new(i, GlobalTaskId::new(i as u32))).collect();
    StepContext {
        job_id: JobId::new(7),
        step_id: StepId::from(0),
        node_id: NodeId::new(0),
        ntasks,
        nnodes: 1,
        is_batch: false,
        is_spawn: false,
        debug_level: 0,
        user: UserIdentity {
            uid: 1000,
            gid: 1000,
            name: "alice".into(),
            home: "/home/alice".into(),
            supplementary_gids: Some(vec![1000]),
        },
        container_id: None,
        tasks,
        env: Environment::new(),
        clients: Vec::new(),
        argv: vec!["/bin/true".into()],
        pgid: None,
        cwd: "/tmp".into(),
        batch_dir: None,
        state: OrchestratorState::Init,
        jobacct: JobAcct::default(),
    }
}

pub fn client_link(resp_addr: Option<&str>) -> ClientLink {
    ClientLink {
        client_addr: "127.0.0.1:7000".parse().unwrap(),
        resp_addr: resp_addr.map(|a| a.parse().unwrap()),
    }
}

pub fn test_node_config() -> NodeConfig {
    NodeConfig {
        node_name: "node03".into(),
        spool_dir: std::env::temp_dir(),
        controller_addr: "127.0.0.1:6817".parse().unwrap(),
        children_timeout: Duration::from_millis(50),
        parent_retry: 2,
        batch_max_retry: 2,
        batch_retry_delay: Duration::from_millis(1),
        task_epilog: None,
        task_epilog_site: None,
        pam_service: "slurm".into(),
    }
}
