// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node-level configuration. Loaded once per step-manager invocation from
//! environment variables the forking node daemon sets (spec §2 Out of
//! scope: "Configuration loading ... the parent daemon's request
//! dispatch" — this crate only needs the handful of values below, not a
//! general config file format).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    InvalidVar { name: &'static str, value: String, reason: String },
}

/// Per-invocation node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_name: String,
    /// Batch spool root; per-step directories are created under here
    /// (spec §4.7, §6 filesystem surface).
    pub spool_dir: PathBuf,
    pub controller_addr: SocketAddr,
    /// Base budget for the completion-tree child wait, before the
    /// `3*(max_depth - depth)` extension (spec §4.6).
    pub children_timeout: Duration,
    /// `PARENT_RETRY` attempts before falling back to the controller
    /// (spec §4.6, §5).
    pub parent_retry: u32,
    /// `MAX_RETRY` attempts for batch-completion RPCs (spec §4.7: 240).
    pub batch_max_retry: u32,
    /// `RETRY_DELAY` between batch-completion attempts (spec §4.7: 15s).
    pub batch_retry_delay: Duration,
    /// User-supplied per-task epilog, run with the task's local id as its
    /// sole argument (spec §4.4 "first the user-supplied path"). Absent
    /// when the job didn't request one.
    pub task_epilog: Option<PathBuf>,
    /// Site-admin epilog, run with no enforced argv (spec §4.4 "the
    /// site-admin path"). Absent when the node isn't configured with one.
    pub task_epilog_site: Option<PathBuf>,
    /// PAM service name used to open the job's session (spec §4.3 step 5).
    pub pam_service: String,
}

const ENV_NODE_NAME: &str = "STEPD_NODE_NAME";
const ENV_SPOOL_DIR: &str = "STEPD_SPOOL_DIR";
const ENV_CONTROLLER_ADDR: &str = "STEPD_CONTROLLER_ADDR";
const ENV_TASK_EPILOG: &str = "STEPD_TASK_EPILOG";
const ENV_TASK_EPILOG_SITE: &str = "STEPD_TASK_EPILOG_SITE";
const ENV_PAM_SERVICE: &str = "STEPD_PAM_SERVICE";
const DEFAULT_PAM_SERVICE: &str = "slurm";

impl NodeConfig {
    /// Read configuration from the environment the forking node daemon set
    /// up for this invocation. Timeouts and retry bounds are fixed per
    /// spec §4.6/§4.7, not environment-tunable.
    pub fn load() -> Result<Self, ConfigError> {
        let node_name = read_var(ENV_NODE_NAME)?;
        let spool_dir = PathBuf::from(read_var(ENV_SPOOL_DIR)?);
        let controller_raw = read_var(ENV_CONTROLLER_ADDR)?;
        let controller_addr = controller_raw.parse().map_err(|e| ConfigError::InvalidVar {
            name: ENV_CONTROLLER_ADDR,
            value: controller_raw,
            reason: format!("{e}"),
        })?;

        Ok(Self {
            node_name,
            spool_dir,
            controller_addr,
            children_timeout: Duration::from_secs(10),
            parent_retry: 3,
            batch_max_retry: 240,
            batch_retry_delay: Duration::from_secs(15),
            task_epilog: std::env::var(ENV_TASK_EPILOG).ok().map(PathBuf::from),
            task_epilog_site: std::env::var(ENV_TASK_EPILOG_SITE).ok().map(PathBuf::from),
            pam_service: std::env::var(ENV_PAM_SERVICE).unwrap_or_else(|_| DEFAULT_PAM_SERVICE.to_string()),
        })
    }
}

fn read_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
