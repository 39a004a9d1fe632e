use super::*;

#[test]
fn snapshot_is_plain_data_and_cloneable() {
    let snap = PrivilegeSnapshot {
        saved_uid: 0,
        saved_gid: 0,
        saved_groups: vec![0, 27],
        saved_cwd: "/root".into(),
    };
    let cloned = snap.clone();
    assert_eq!(cloned.saved_uid, snap.saved_uid);
    assert_eq!(cloned.saved_groups, snap.saved_groups);
}
