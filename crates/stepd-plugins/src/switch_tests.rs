use super::*;

fn ctx() -> SwitchContext {
    SwitchContext { job_id: 1, step_id: 0, ntasks: 2, nnodes: 1 }
}

#[tokio::test]
async fn noop_switch_accepts_every_transition() {
    let plugin = NoopSwitchPlugin;
    plugin.pre_init(&ctx()).await.unwrap();
    plugin.init(&ctx()).await.unwrap();
    plugin.fini(&ctx()).await.unwrap();
    plugin.post_fini(&ctx()).await.unwrap();
}

#[tokio::test]
async fn fake_switch_records_transitions_in_order() {
    let plugin = FakeSwitchPlugin::new();
    plugin.pre_init(&ctx()).await.unwrap();
    plugin.init(&ctx()).await.unwrap();
    plugin.fini(&ctx()).await.unwrap();
    plugin.post_fini(&ctx()).await.unwrap();

    assert_eq!(
        plugin.calls(),
        vec![SwitchCall::PreInit, SwitchCall::Init, SwitchCall::Fini, SwitchCall::PostFini]
    );
}
