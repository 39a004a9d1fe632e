use super::*;
use crate::test_support::{client_link, test_context};
use stepd_core::NodeId;
use stepd_wire::{FakeTransport, OutboundMessage, RecordedCall};

#[tokio::test]
async fn send_launch_failure_coerces_a_zero_return_code_to_negative_one() {
    let transport = FakeTransport::new();
    send_launch_failure(&transport, "127.0.0.1:9000".parse().unwrap(), "node03", NodeId::new(2), 0).await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        RecordedCall::Send { msg: OutboundMessage::LaunchFailure { return_code, node_name, .. }, .. } => {
            assert_eq!(*return_code, -1);
            assert_eq!(node_name, "node03");
        }
        _ => panic!("unexpected call"),
    }
}

#[tokio::test]
async fn send_launch_failure_preserves_a_nonzero_return_code() {
    let transport = FakeTransport::new();
    send_launch_failure(&transport, "127.0.0.1:9000".parse().unwrap(), "node03", NodeId::new(2), 17).await;

    match &transport.calls()[0] {
        RecordedCall::Send { msg: OutboundMessage::LaunchFailure { return_code, .. }, .. } => {
            assert_eq!(*return_code, 17);
        }
        _ => panic!("unexpected call"),
    }
}

#[tokio::test]
async fn send_launch_success_is_skipped_for_batch_steps() {
    let mut ctx = test_context(1);
    ctx.is_batch = true;
    ctx.clients.push(client_link(Some("127.0.0.1:9000")));

    let transport = FakeTransport::new();
    send_launch_success(&transport, &ctx, "node03", 0).await;
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn send_launch_success_is_skipped_for_spawn_steps() {
    let mut ctx = test_context(1);
    ctx.is_spawn = true;
    ctx.clients.push(client_link(Some("127.0.0.1:9000")));

    let transport = FakeTransport::new();
    send_launch_success(&transport, &ctx, "node03", 0).await;
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn send_launch_success_carries_local_pids_to_every_response_endpoint() {
    let mut ctx = test_context(2);
    ctx.tasks[0].pid = 100;
    ctx.tasks[1].pid = 101;
    ctx.clients.push(client_link(Some("127.0.0.1:9000")));
    ctx.clients.push(client_link(Some("127.0.0.1:9001")));
    ctx.clients.push(client_link(None));

    let transport = FakeTransport::new();
    send_launch_success(&transport, &ctx, "node03", 0).await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    for call in &calls {
        match call {
            RecordedCall::Send { msg: OutboundMessage::LaunchSuccess { local_pids, .. }, .. } => {
                assert_eq!(local_pids, &vec![100, 101]);
            }
            _ => panic!("unexpected call"),
        }
    }
}
