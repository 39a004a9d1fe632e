use super::*;
use crate::test_support::{client_link, test_context};
use stepd_wire::{OutboundMessage, RecordedCall};

#[tokio::test]
async fn send_pending_batches_tasks_sharing_an_exit_status() {
    let mut ctx = test_context(3);
    ctx.clients.push(client_link(Some("127.0.0.1:9000")));
    ctx.tasks[0].mark_exited(0);
    ctx.tasks[1].mark_exited(0);
    ctx.tasks[2].mark_exited(7 << 8);

    let transport = stepd_wire::FakeTransport::new();
    let sent = send_pending(&mut ctx, &transport).await;
    assert_eq!(sent, 3);
    assert!(ctx.tasks.iter().all(|t| t.exit_sent));

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    let mut batch_sizes: Vec<usize> = calls
        .iter()
        .map(|c| match c {
            RecordedCall::Send { msg: OutboundMessage::TaskExit(exit), .. } => exit.num_tasks,
            _ => panic!("unexpected call"),
        })
        .collect();
    batch_sizes.sort();
    assert_eq!(batch_sizes, vec![1, 2]);
}

#[tokio::test]
async fn send_pending_skips_clients_with_no_response_endpoint() {
    let mut ctx = test_context(1);
    ctx.clients.push(client_link(None));
    ctx.tasks[0].mark_exited(0);

    let transport = stepd_wire::FakeTransport::new();
    let sent = send_pending(&mut ctx, &transport).await;
    assert_eq!(sent, 1);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn send_pending_is_a_noop_when_nothing_is_pending() {
    let mut ctx = test_context(1);
    ctx.clients.push(client_link(Some("127.0.0.1:9000")));

    let transport = stepd_wire::FakeTransport::new();
    let sent = send_pending(&mut ctx, &transport).await;
    assert_eq!(sent, 0);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn send_pending_never_resends_an_already_sent_task() {
    let mut ctx = test_context(1);
    ctx.clients.push(client_link(Some("127.0.0.1:9000")));
    ctx.tasks[0].mark_exited(0);

    let transport = stepd_wire::FakeTransport::new();
    assert_eq!(send_pending(&mut ctx, &transport).await, 1);
    assert_eq!(send_pending(&mut ctx, &transport).await, 0);
    assert_eq!(transport.calls().len(), 1);
}
