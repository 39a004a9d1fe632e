use super::*;
use crate::io::{FakeIoPump, NoopIoPump};
use crate::test_support::{client_link, test_context, test_node_config};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::{getgid, getuid};
use serial_test::serial;
use stepd_core::CompletionState;
use stepd_wire::{FakeTransport, RecordedCall};

/// These tests fork real tasks, so they run under the test process's own
/// identity, mirroring `forker_tests.rs::unprivileged_ctx`.
fn unprivileged_ctx(ntasks: usize) -> StepContext {
    let mut ctx = test_context(ntasks);
    ctx.user.uid = getuid().as_raw();
    ctx.user.gid = getgid().as_raw();
    ctx.user.supplementary_gids = None;
    ctx.argv = vec!["/bin/true".to_string()];
    ctx
}

fn reap_all_children() {
    loop {
        match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(nix::sys::wait::WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => continue,
        }
    }
}

fn noop_deps<'a>(
    config: &'a NodeConfig,
    container: &'a dyn ContainerPlugin,
    switch: &'a dyn SwitchPlugin,
    pam: &'a dyn PamPlugin,
    spank: &'a dyn SpankPlugin,
    accounting: &'a dyn AccountingPlugin,
    io: &'a dyn IoPump,
    transport: &'a dyn Transport,
) -> OrchestratorDeps<'a> {
    OrchestratorDeps { config, container, switch, pam, spank, accounting, io, transport }
}

#[tokio::test]
async fn ntasks_zero_skips_the_forker_and_completes_cleanly() {
    let config = test_node_config();
    let container = stepd_plugins::FakeContainerPlugin::new();
    let switch = stepd_plugins::FakeSwitchPlugin::new();
    let pam = stepd_plugins::FakePamPlugin::new();
    let spank = stepd_plugins::FakeSpankPlugin::new();
    let accounting = stepd_plugins::FakeAccountingPlugin::new();
    let io = NoopIoPump;
    let transport = FakeTransport::new();

    let deps = noop_deps(&config, &container, &switch, &pam, &spank, &accounting, &io, &transport);
    let orchestrator = Orchestrator::new(deps);
    let mut ctx = test_context(0);

    let rc = orchestrator.run(&mut ctx, None).await;

    assert_eq!(rc, 0);
    assert_eq!(ctx.state, stepd_core::OrchestratorState::Complete);
    assert!(container.calls().is_empty(), "forker must not run for ntasks == 0");
}

#[tokio::test]
#[serial]
async fn single_task_success_emits_a_completion_range_with_no_tree_parent() {
    let config = test_node_config();
    let container = stepd_plugins::FakeContainerPlugin::new();
    let switch = stepd_plugins::FakeSwitchPlugin::new();
    let pam = stepd_plugins::FakePamPlugin::new();
    let spank = stepd_plugins::FakeSpankPlugin::new();
    let accounting = stepd_plugins::FakeAccountingPlugin::new();
    let io = NoopIoPump;
    let transport = FakeTransport::new();
    transport.queue_reply(stepd_wire::ReplyCode::Success);

    let deps = noop_deps(&config, &container, &switch, &pam, &spank, &accounting, &io, &transport);
    let orchestrator = Orchestrator::new(deps);
    let mut ctx = unprivileged_ctx(1);
    let tree = CompletionState::new(0, -1, None, 0, 0, 0);

    let rc = orchestrator.run(&mut ctx, Some(&tree)).await;

    assert_eq!(rc, 0);
    assert_eq!(ctx.state, stepd_core::OrchestratorState::Complete);
    assert!(ctx.tasks[0].exited);
    assert!(switch.calls().contains(&stepd_plugins::SwitchCall::PreInit));
    assert!(switch.calls().contains(&stepd_plugins::SwitchCall::Init));
    assert!(switch.calls().contains(&stepd_plugins::SwitchCall::Fini));
    assert!(switch.calls().contains(&stepd_plugins::SwitchCall::PostFini));
    assert!(
        transport.calls().iter().any(|c| matches!(c, RecordedCall::Request { msg, .. }
            if matches!(msg, stepd_wire::OutboundMessage::StepComplete(_))))
    );

    reap_all_children();
}

#[tokio::test]
#[serial]
async fn batch_step_reports_completion_and_removes_its_spool_directory() {
    let config = test_node_config();
    let container = stepd_plugins::FakeContainerPlugin::new();
    let switch = stepd_plugins::FakeSwitchPlugin::new();
    let pam = stepd_plugins::FakePamPlugin::new();
    let spank = stepd_plugins::FakeSpankPlugin::new();
    let accounting = stepd_plugins::FakeAccountingPlugin::new();
    let io = NoopIoPump;
    let transport = FakeTransport::new();
    transport.queue_reply(stepd_wire::ReplyCode::Success);

    let deps = noop_deps(&config, &container, &switch, &pam, &spank, &accounting, &io, &transport);
    let orchestrator = Orchestrator::new(deps);

    let mut ctx = unprivileged_ctx(1);
    ctx.is_batch = true;
    let batch_dir = crate::batch::make_batch_dir(&ctx, &config.spool_dir).unwrap();
    crate::batch::materialize_script(b"#!/bin/sh\nexit 0\n", &batch_dir, ctx.user.uid).unwrap();
    ctx.batch_dir = Some(batch_dir.clone());

    let rc = orchestrator.run(&mut ctx, None).await;

    assert_eq!(rc, 0);
    assert!(!batch_dir.exists(), "batch directory must be removed on completion");
    assert!(
        transport.calls().iter().any(|c| matches!(c, RecordedCall::Request { msg, .. }
            if matches!(msg, stepd_wire::OutboundMessage::CompleteBatchScript(_))))
    );
    // Non-batch-only hooks never run for a batch step.
    assert!(switch.calls().is_empty());

    reap_all_children();
}

#[tokio::test]
async fn io_setup_failure_aborts_before_fork_and_reports_launch_failure() {
    let config = test_node_config();
    let container = stepd_plugins::FakeContainerPlugin::new();
    let switch = stepd_plugins::FakeSwitchPlugin::new();
    let pam = stepd_plugins::FakePamPlugin::new();
    let spank = stepd_plugins::FakeSpankPlugin::new();
    let accounting = stepd_plugins::FakeAccountingPlugin::new();
    let io = FakeIoPump::new();
    io.fail_setup("socket backend unavailable");
    let transport = FakeTransport::new();

    let deps = noop_deps(&config, &container, &switch, &pam, &spank, &accounting, &io, &transport);
    let orchestrator = Orchestrator::new(deps);

    let mut ctx = test_context(1);
    ctx.clients = vec![client_link(Some("127.0.0.1:7001")), client_link(None)];

    let rc = orchestrator.run(&mut ctx, None).await;

    assert_eq!(rc, -1);
    assert_eq!(ctx.state, stepd_core::OrchestratorState::Complete);
    assert!(container.calls().is_empty(), "the forker must never run on a pre-fork failure");
    let sends: Vec<_> = transport
        .calls()
        .into_iter()
        .filter(|c| matches!(c, RecordedCall::Send { msg, .. } if matches!(msg, stepd_wire::OutboundMessage::LaunchFailure { .. })))
        .collect();
    assert_eq!(sends.len(), 1, "only the client with a response endpoint gets a reply");
}

#[tokio::test]
#[serial]
async fn container_create_failure_aborts_before_fork_without_touching_the_container() {
    let config = test_node_config();
    let container = stepd_plugins::FakeContainerPlugin::new();
    container.fail_create(stepd_plugins::PluginError::new("container backend unavailable"));
    let switch = stepd_plugins::FakeSwitchPlugin::new();
    let pam = stepd_plugins::FakePamPlugin::new();
    let spank = stepd_plugins::FakeSpankPlugin::new();
    let accounting = stepd_plugins::FakeAccountingPlugin::new();
    let io = NoopIoPump;
    let transport = FakeTransport::new();

    let deps = noop_deps(&config, &container, &switch, &pam, &spank, &accounting, &io, &transport);
    let orchestrator = Orchestrator::new(deps);
    let mut ctx = unprivileged_ctx(1);
    ctx.clients = vec![client_link(Some("127.0.0.1:7002"))];

    let rc = orchestrator.run(&mut ctx, None).await;

    assert_eq!(rc, -1);
    assert!(ctx.container_id.is_none());
    assert!(!container.calls().iter().any(|c| matches!(c, stepd_plugins::ContainerCall::Destroy)));

    reap_all_children();
}

#[tokio::test]
#[serial]
async fn straggler_kill_retries_destroy_until_it_succeeds() {
    let config = test_node_config();
    let container = stepd_plugins::FakeContainerPlugin::new();
    container.queue_destroy_failure(stepd_plugins::PluginError::new("group still has processes"));
    let switch = stepd_plugins::FakeSwitchPlugin::new();
    let pam = stepd_plugins::FakePamPlugin::new();
    let spank = stepd_plugins::FakeSpankPlugin::new();
    let accounting = stepd_plugins::FakeAccountingPlugin::new();
    let io = NoopIoPump;
    let transport = FakeTransport::new();
    transport.queue_reply(stepd_wire::ReplyCode::Success);

    let deps = noop_deps(&config, &container, &switch, &pam, &spank, &accounting, &io, &transport);
    let orchestrator = Orchestrator::new(deps);
    let mut ctx = unprivileged_ctx(1);
    let tree = CompletionState::new(0, -1, None, 0, 0, 0);

    let rc = orchestrator.run(&mut ctx, Some(&tree)).await;

    assert_eq!(rc, 0);
    let destroys = container.calls().into_iter().filter(|c| matches!(c, stepd_plugins::ContainerCall::Destroy)).count();
    assert_eq!(destroys, 2, "destroy must be retried after the first failure");

    reap_all_children();
}
