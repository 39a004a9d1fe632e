// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Privilege Cell (C1): scoped drop/reclaim/become-user around a
//! [`PrivilegeSnapshot`], enforced with an RAII guard rather than the
//! matching manual labels the original implementation uses (spec §9 Design
//! Notes: "a future Rust port should express this as an RAII guard").

use std::ffi::CString;
use std::path::{Path, PathBuf};

use nix::unistd::{getegid, geteuid, getcwd, setegid, seteuid, setgroups, setregid, setreuid, Gid, Uid};
use stepd_core::{PrivilegeSnapshot, StepError, StepResult};
use tracing::warn;

/// RAII scope produced by [`drop_privileges`]. Dropping it without calling
/// [`PrivilegeGuard::reclaim`] still restores the saved identity — on the
/// best-effort basis spec §7 allows for reclaim failures ("logged and
/// suppressed"), since a `Drop` impl cannot propagate an error.
pub struct PrivilegeGuard {
    snapshot: PrivilegeSnapshot,
    reclaimed: bool,
}

impl PrivilegeGuard {
    /// The manager's own cwd captured before the privilege drop, for
    /// restoring after a job-cwd chdir (spec §4.3 step 10: "Reclaim
    /// privileges. Restore saved cwd.").
    pub fn saved_cwd(&self) -> &Path {
        &self.snapshot.saved_cwd
    }

    /// Restore the saved identity. Consumes the guard so a caller cannot
    /// reclaim twice.
    pub fn reclaim(mut self) -> StepResult<()> {
        self.reclaim_inner()
    }

    fn reclaim_inner(&mut self) -> StepResult<()> {
        if self.reclaimed {
            return Ok(());
        }
        reclaim(&self.snapshot)?;
        self.reclaimed = true;
        Ok(())
    }

    /// Reclaim, then permanently drop to the job user (spec §4.1
    /// `become_user`). Consumes the guard: there is no privilege left to
    /// restore afterward.
    pub fn become_user(mut self, target_uid: u32, target_gid: u32) -> StepResult<()> {
        self.reclaim_inner()?;
        setregid(Gid::from_raw(target_gid), Gid::from_raw(target_gid))
            .map_err(|e| StepError::BecomeUser(format!("setregid: {e}")))?;
        setreuid(Uid::from_raw(target_uid), Uid::from_raw(target_uid))
            .map_err(|e| StepError::BecomeUser(format!("setreuid: {e}")))?;
        Ok(())
    }
}

impl Drop for PrivilegeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.reclaim_inner() {
            warn!(error = %e, "privilege reclaim on drop failed, identity may be left dropped");
        }
    }
}

/// Drop from root to the job identity (spec §4.1 `drop`). No-op (returns the
/// snapshot unchanged) if the caller is not root — most of this workspace's
/// test doubles run unprivileged and rely on that no-op.
pub fn drop_privileges(
    target_uid: u32,
    target_gid: u32,
    supplementary_gids: Option<&[u32]>,
    user_name: &str,
    do_setuid: bool,
) -> StepResult<PrivilegeGuard> {
    let saved_uid = geteuid().as_raw();
    let saved_gid = getegid().as_raw();
    let saved_groups = current_supplementary_groups().map_err(StepError::PrivilegeDrop)?;
    let saved_cwd = getcwd().map_err(|e| StepError::PrivilegeDrop(format!("getcwd: {e}")))?;

    let snapshot = PrivilegeSnapshot { saved_uid, saved_gid, saved_groups, saved_cwd };

    if !Uid::effective().is_root() {
        return Ok(PrivilegeGuard { snapshot, reclaimed: false });
    }

    setegid(Gid::from_raw(target_gid)).map_err(|e| StepError::PrivilegeDrop(format!("setegid: {e}")))?;

    let groups = match supplementary_gids {
        Some(gids) => gids.to_vec(),
        None => resolve_supplementary_groups(user_name, target_gid).map_err(StepError::PrivilegeDrop)?,
    };
    setgroups(&groups.iter().copied().map(Gid::from_raw).collect::<Vec<_>>())
        .map_err(|e| StepError::PrivilegeDrop(format!("setgroups: {e}")))?;

    if do_setuid {
        seteuid(Uid::from_raw(target_uid)).map_err(|e| StepError::PrivilegeDrop(format!("seteuid: {e}")))?;
    }

    Ok(PrivilegeGuard { snapshot, reclaimed: false })
}

fn reclaim(snapshot: &PrivilegeSnapshot) -> StepResult<()> {
    if geteuid().as_raw() == snapshot.saved_uid {
        return Ok(());
    }
    seteuid(Uid::from_raw(snapshot.saved_uid)).map_err(|e| StepError::PrivilegeReclaim(format!("seteuid: {e}")))?;
    setegid(Gid::from_raw(snapshot.saved_gid)).map_err(|e| StepError::PrivilegeReclaim(format!("setegid: {e}")))?;
    setgroups(&snapshot.saved_groups.iter().copied().map(Gid::from_raw).collect::<Vec<_>>())
        .map_err(|e| StepError::PrivilegeReclaim(format!("setgroups: {e}")))?;
    Ok(())
}

fn current_supplementary_groups() -> Result<Vec<u32>, String> {
    nix::unistd::getgroups()
        .map(|gids| gids.into_iter().map(Gid::as_raw).collect())
        .map_err(|e| format!("getgroups: {e}"))
}

/// Derive supplementary groups for `user_name` via the platform's group
/// database (spec §4.1: "derive via the platform's group database for the
/// user name and primary gid") when the controller sent no pre-resolved
/// list. `nix` exposes no safe wrapper for `getgrouplist`, so this is the
/// one place in the crate that reaches into `libc` directly.
#[allow(unsafe_code)]
fn resolve_supplementary_groups(user_name: &str, primary_gid: u32) -> Result<Vec<u32>, String> {
    let c_name = CString::new(user_name).map_err(|e| format!("user name contains a NUL byte: {e}"))?;

    // Two-pass libc idiom: call once to learn the group count, then again
    // with a buffer sized to hold it. `getgrouplist` returns -1 and leaves
    // the larger count in `ngroups` when the initial guess was too small.
    let mut ngroups: libc::c_int = 16;
    let mut buf: Vec<libc::gid_t> = vec![0; ngroups as usize];

    // SAFETY: `c_name` is a valid NUL-terminated C string for the duration
    // of the call; `buf` is sized to `ngroups` elements and `ngroups` is
    // updated in place by the callee, matching `getgrouplist`'s contract.
    let rc = unsafe {
        libc::getgrouplist(
            c_name.as_ptr(),
            primary_gid as libc::gid_t,
            buf.as_mut_ptr(),
            &mut ngroups,
        )
    };

    if rc < 0 {
        buf.resize(ngroups as usize, 0);
        // SAFETY: same contract as above, with `buf` resized to the count
        // the first call reported.
        let rc = unsafe {
            libc::getgrouplist(
                c_name.as_ptr(),
                primary_gid as libc::gid_t,
                buf.as_mut_ptr(),
                &mut ngroups,
            )
        };
        if rc < 0 {
            return Err(format!("getgrouplist failed to resolve groups for {user_name:?}"));
        }
    }

    buf.truncate(ngroups.max(0) as usize);
    Ok(buf.into_iter().map(|g| g as u32).collect())
}

/// Change to the job's working directory, falling back to `/tmp` if that
/// fails, per spec §4.3 step 7. Returns the directory actually entered.
pub fn chdir_job_or_tmp(job_cwd: &Path) -> StepResult<PathBuf> {
    if nix::unistd::chdir(job_cwd).is_ok() {
        return Ok(job_cwd.to_path_buf());
    }
    let tmp = Path::new("/tmp");
    nix::unistd::chdir(tmp).map_err(|e| StepError::Chdir(format!("both job cwd and /tmp failed: {e}")))?;
    Ok(tmp.to_path_buf())
}

#[cfg(test)]
#[path = "privilege_cell_tests.rs"]
mod tests;
