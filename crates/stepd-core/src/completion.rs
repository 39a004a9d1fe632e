//! `CompletionState` — the reverse-tree fan-in bookkeeping shared across a
//! step's peer managers (spec §3, §4.6, §8).
//!
//! Held locally behind a mutex + condition variable, exactly as spec §5
//! calls for; `parking_lot` gives both in one crate, matching its use
//! throughout the teacher's daemon lifecycle code.

use crate::context::JobAcct;
use parking_lot::{Condvar, Mutex};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Sentinel meaning "no step_rc received yet".
pub const NO_RC: i32 = -1;

struct Inner {
    rank: i64,
    parent_rank: i64,
    parent_addr: Option<SocketAddr>,
    children: usize,
    depth: u32,
    max_depth: u32,
    /// length == `children`; `bits[i]` is set once rank `rank + 1 + i` has
    /// reported completion.
    bits: Vec<bool>,
    step_rc: i32,
    jobacct: JobAcct,
}

/// One `StepComplete` message worth of data, ready to hand to the wire
/// layer (spec §6 `RequestStepComplete`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRange {
    pub first: i64,
    pub last: i64,
    pub step_rc: i32,
    pub jobacct: JobAcct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// `children == 0`; nothing to wait for.
    NoChildren,
    /// Every child rank reported before the deadline.
    AllReceived,
    /// The deadline elapsed with some bits still unset.
    TimedOut { missing: usize },
}

pub struct CompletionState {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl CompletionState {
    /// `rank < 0` denotes "no tree" (spec §4.6 precondition); callers should
    /// not construct a `CompletionState` in that case at all — the
    /// orchestrator skips C6 entirely for such steps.
    pub fn new(
        rank: i64,
        parent_rank: i64,
        parent_addr: Option<SocketAddr>,
        children: usize,
        depth: u32,
        max_depth: u32,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rank,
                parent_rank,
                parent_addr,
                children,
                depth,
                max_depth,
                bits: vec![false; children],
                step_rc: NO_RC,
                jobacct: JobAcct::default(),
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn rank(&self) -> i64 {
        self.inner.lock().rank
    }

    pub fn parent_rank(&self) -> i64 {
        self.inner.lock().parent_rank
    }

    pub fn parent_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().parent_addr
    }

    pub fn children(&self) -> usize {
        self.inner.lock().children
    }

    pub fn step_rc(&self) -> i32 {
        self.inner.lock().step_rc
    }

    pub fn jobacct(&self) -> JobAcct {
        self.inner.lock().jobacct
    }

    /// External `ChildComplete(range_first, range_last, child_rc,
    /// child_jobacct)` transition (spec §4.6).
    pub fn child_complete(
        &self,
        range_first: i64,
        range_last: i64,
        child_rc: i32,
        child_jobacct: JobAcct,
    ) {
        let mut inner = self.inner.lock();
        let rank = inner.rank;
        let lo = (range_first - rank - 1).max(0) as usize;
        let hi = (range_last - rank - 1) as usize;
        for i in lo..=hi.min(inner.bits.len().saturating_sub(1)) {
            if let Some(bit) = inner.bits.get_mut(i) {
                *bit = true;
            }
        }
        inner.step_rc = inner.step_rc.max(child_rc);
        inner.jobacct.aggregate(&child_jobacct);
        self.condvar.notify_all();
    }

    /// Internal `LocalTasksComplete` transition: fold the max WEXITSTATUS
    /// over this node's own tasks into `step_rc` (spec §4.6, and the
    /// original's `_wait_for_children_slurmstepd` loop over `job->task[i]`).
    pub fn fold_local_rc(&self, max_local_wexitstatus: i32) {
        let mut inner = self.inner.lock();
        inner.step_rc = inner.step_rc.max(max_local_wexitstatus);
    }

    /// Fold a local accounting aggregate (reaped tasks) into `jobacct`.
    pub fn fold_local_jobacct(&self, local: &JobAcct) {
        let mut inner = self.inner.lock();
        inner.jobacct.aggregate(local);
    }

    /// Wait for all children to report, bounded by
    /// `children_timeout + 3*(max_depth - depth)` seconds (spec §4.6, §5).
    pub fn wait_for_children(&self, children_timeout: Duration) -> WaitOutcome {
        let mut inner = self.inner.lock();
        if inner.children == 0 {
            return WaitOutcome::NoChildren;
        }
        let extra = Duration::from_secs(3 * u64::from(inner.max_depth.saturating_sub(inner.depth)));
        let deadline = Instant::now() + children_timeout + extra;
        loop {
            if inner.bits.iter().all(|&b| b) {
                return WaitOutcome::AllReceived;
            }
            let now = Instant::now();
            if now >= deadline {
                let missing = inner.bits.iter().filter(|&&b| !b).count();
                return WaitOutcome::TimedOut { missing };
            }
            let remaining = deadline - now;
            let timed_out = self.condvar.wait_for(&mut inner, remaining).timed_out();
            if timed_out && !inner.bits.iter().all(|&b| b) {
                let missing = inner.bits.iter().filter(|&&b| !b).count();
                return WaitOutcome::TimedOut { missing };
            }
        }
    }

    /// Internal `Emit` transition: walk `bits` left to right, group
    /// contiguous set runs, and produce the `StepComplete` ranges to send
    /// (spec §4.6 and the original's `_bit_getrange`/`_send_step_complete_msgs`).
    pub fn emit(&self) -> Vec<CompletionRange> {
        let inner = self.inner.lock();
        let rank = inner.rank;
        let size = inner.bits.len();

        if size == 0 {
            return vec![CompletionRange {
                first: rank,
                last: rank,
                step_rc: inner.step_rc,
                jobacct: inner.jobacct,
            }];
        }

        let mut out = Vec::new();
        let mut start = 0usize;
        let mut sent_own = false;
        while let Some((first, last)) = bit_getrange(&inner.bits, start, size) {
            let mut first_i = first as i64;
            if start == 0 && first == 0 {
                sent_own = true;
                first_i = -1;
            }
            out.push(CompletionRange {
                first: first_i + rank + 1,
                last: last as i64 + rank + 1,
                step_rc: inner.step_rc,
                jobacct: inner.jobacct,
            });
            start = last + 1;
        }
        if !sent_own {
            out.push(CompletionRange {
                first: rank,
                last: rank,
                step_rc: inner.step_rc,
                jobacct: inner.jobacct,
            });
        }
        out
    }
}

/// Find the next contiguous run of set bits starting at or after `start`.
/// Mirrors the original's `_bit_getrange`.
fn bit_getrange(bits: &[bool], start: usize, size: usize) -> Option<(usize, usize)> {
    let mut first = None;
    let mut last = start;
    for (i, &bit) in bits.iter().enumerate().take(size).skip(start) {
        if bit {
            if first.is_none() {
                first = Some(i);
            }
            last = i;
        } else if first.is_some() {
            break;
        }
    }
    first.map(|f| (f, last))
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;
