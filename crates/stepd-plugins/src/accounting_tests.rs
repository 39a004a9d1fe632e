use super::*;

#[tokio::test]
async fn noop_accounting_polls_to_zeroed_aggregate() {
    let plugin = NoopAccountingPlugin;
    plugin.register_pid(123).await.unwrap();
    let acct = plugin.poll(123).await.unwrap();
    assert_eq!(acct, JobAcct::default());
    plugin.release(123).await.unwrap();
}

#[tokio::test]
async fn fake_accounting_returns_seeded_usage() {
    let plugin = FakeAccountingPlugin::new();
    plugin.register_pid(7).await.unwrap();
    plugin.set_usage(7, JobAcct { user_cpu_usec: 100, sys_cpu_usec: 10, max_rss_kb: 4096, max_vsize_kb: 8192 });

    let acct = plugin.poll(7).await.unwrap();
    assert_eq!(acct.user_cpu_usec, 100);
    assert_eq!(acct.max_rss_kb, 4096);

    plugin.release(7).await.unwrap();
    assert_eq!(plugin.registered(), vec![7]);
    assert_eq!(plugin.released(), vec![7]);
}

#[tokio::test]
async fn fake_accounting_unknown_pid_polls_to_default() {
    let plugin = FakeAccountingPlugin::new();
    assert_eq!(plugin.poll(999).await.unwrap(), JobAcct::default());
}
