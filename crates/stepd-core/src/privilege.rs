//! `PrivilegeSnapshot` — the saved identity a privilege drop must restore
//! (spec §3, §4.1).

/// Saved real uid/gid, supplementary groups and cwd captured by a privilege
/// drop, consumed by the matching reclaim. Invariant: every drop is matched
/// by exactly one reclaim on every exit path — `stepd-daemon::privilege_cell`
/// enforces this with an RAII guard over this snapshot (Design Notes §9).
#[derive(Debug, Clone)]
pub struct PrivilegeSnapshot {
    pub saved_uid: u32,
    pub saved_gid: u32,
    pub saved_groups: Vec<u32>,
    pub saved_cwd: std::path::PathBuf,
}

#[cfg(test)]
#[path = "privilege_tests.rs"]
mod tests;
