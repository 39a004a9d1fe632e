//! Numeric identifiers for jobs, steps and nodes.
//!
//! Unlike the random, type-prefixed IDs used elsewhere in this workspace's
//! lineage, job/step/node identifiers here are small integers assigned by
//! the cluster controller and echoed back verbatim in every message — they
//! need ordering, formatting with fixed width (`job{:05}`), and a sentinel
//! value, not randomness.

use std::fmt;

/// Sentinel step id meaning "this is a batch step with no step allocation".
pub const NO_STEP: u32 = u32::MAX;

macro_rules! define_numeric_id {
    ($(#[$meta:meta])* pub struct $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            pub const fn get(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }
    };
}

define_numeric_id! {
    /// Identifier of the job this step belongs to.
    pub struct JobId
}

define_numeric_id! {
    /// Identifier of the job step. `NO_STEP` marks a batch-only job.
    pub struct StepId
}

impl StepId {
    /// A step id denoting "no step" (batch-only job), per spec §3.
    pub const NONE: StepId = StepId(NO_STEP);

    pub fn is_none(self) -> bool {
        self.0 == NO_STEP
    }
}

impl Default for StepId {
    fn default() -> Self {
        StepId::NONE
    }
}

define_numeric_id! {
    /// This node's position (0-based) among the nodes allocated to the step.
    pub struct NodeId
}

define_numeric_id! {
    /// A task's cluster-wide rank within the step.
    pub struct GlobalTaskId
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
