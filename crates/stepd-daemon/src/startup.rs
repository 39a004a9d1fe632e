// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small startup cosmetics carried over from the original job manager's
//! setup sequence: process-title update, a debug-build core-dump toggle,
//! and a batch CPU-group summary string for log lines. None of these are
//! load-bearing; every one degrades to a no-op rather than failing the
//! step.

use std::ffi::CString;

/// Best-effort `ps` title update to `[job_id]` or `[job_id.step_id]`
/// (original `_setargs`). A no-op off Linux or on a NUL-containing title
/// rather than a hard failure.
#[allow(unsafe_code)]
pub fn set_process_title(job_id: u32, step_id: u32) {
    let title =
        if step_id == stepd_core::ids::NO_STEP { format!("[{job_id}]") } else { format!("[{job_id}.{step_id}]") };
    let Ok(c_title) = CString::new(title) else { return };

    #[cfg(target_os = "linux")]
    {
        // SAFETY: `c_title` is a valid NUL-terminated string for the call's
        // duration; `PR_SET_NAME` truncates names past 16 bytes rather
        // than faulting on a longer one.
        unsafe {
            libc::prctl(libc::PR_SET_NAME, c_title.as_ptr() as libc::c_ulong, 0, 0, 0);
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = c_title;
    }
}

/// Re-enable core dumps after a privilege transition clears them, debug
/// builds only (original `PR_SET_DUMPABLE` toggle).
#[allow(unsafe_code)]
pub fn restore_dumpable() {
    if !cfg!(debug_assertions) {
        return;
    }
    #[cfg(target_os = "linux")]
    {
        // SAFETY: `PR_SET_DUMPABLE` takes no pointer arguments; `1` enables
        // core dumps for the calling process.
        unsafe {
            libc::prctl(libc::PR_SET_DUMPABLE, 1, 0, 0, 0);
        }
    }
}

/// Run-length-encode repeated values into `"4(x2),8"` form, matching the
/// original's `_sprint_task_cnt` summary used in the batch-launch log
/// line for a step's CPU groups.
pub fn sprint_task_cnt(values: &[u32]) -> String {
    let mut out = Vec::new();
    let mut iter = values.iter().peekable();
    while let Some(&v) = iter.next() {
        let mut count = 1usize;
        while iter.peek() == Some(&&v) {
            iter.next();
            count += 1;
        }
        if count > 1 {
            out.push(format!("{v}(x{count})"));
        } else {
            out.push(v.to_string());
        }
    }
    out.join(",")
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
