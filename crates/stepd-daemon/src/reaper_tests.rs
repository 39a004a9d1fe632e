use super::*;
use crate::test_support::test_context;
use serial_test::serial;
use stepd_plugins::{FakeAccountingPlugin, FakeSpankPlugin};

/// `reap`/`wait_for_all` call `waitpid(None, ...)`, which reaps *any* child
/// of this test process. Serialized so concurrently-running tests in this
/// crate don't race over each other's children.
#[tokio::test]
#[serial]
async fn reap_blocking_matches_a_single_exited_child() {
    let mut ctx = test_context(1);
    let child = std::process::Command::new("true").spawn().unwrap();
    ctx.tasks[0].pid = child.id() as i32;

    let accounting = FakeAccountingPlugin::new();
    let spank = FakeSpankPlugin::new();

    let matched = reap(&mut ctx, true, &accounting, &spank, None, None).await;
    assert_eq!(matched, Some(1));
    assert!(ctx.tasks[0].exited);
    assert_eq!(ctx.tasks[0].wexitstatus(), 0);
}

#[tokio::test]
#[serial]
async fn reap_non_blocking_returns_none_when_no_children_exist() {
    let mut ctx = test_context(0);
    let accounting = FakeAccountingPlugin::new();
    let spank = FakeSpankPlugin::new();

    let matched = reap(&mut ctx, false, &accounting, &spank, None, None).await;
    assert_eq!(matched, None);
}

#[tokio::test]
#[serial]
async fn reap_records_nonzero_exit_status() {
    let mut ctx = test_context(1);
    let child = std::process::Command::new("sh").args(["-c", "exit 7"]).spawn().unwrap();
    ctx.tasks[0].pid = child.id() as i32;

    let accounting = FakeAccountingPlugin::new();
    let spank = FakeSpankPlugin::new();

    reap(&mut ctx, true, &accounting, &spank, None, None).await;
    assert!(ctx.tasks[0].exited);
    assert_eq!(ctx.tasks[0].wexitstatus(), 7);
}

#[tokio::test]
#[serial]
async fn wait_for_all_reaps_every_task_and_drains_batcher() {
    let mut ctx = test_context(2);
    let c0 = std::process::Command::new("true").spawn().unwrap();
    let c1 = std::process::Command::new("true").spawn().unwrap();
    ctx.tasks[0].pid = c0.id() as i32;
    ctx.tasks[1].pid = c1.id() as i32;

    let accounting = FakeAccountingPlugin::new();
    let spank = FakeSpankPlugin::new();
    let transport = stepd_wire::FakeTransport::new();

    wait_for_all(&mut ctx, &accounting, &spank, None, None, &transport).await;

    assert!(ctx.tasks.iter().all(|t| t.exited));
    assert!(ctx.tasks.iter().all(|t| t.exit_sent));
}
