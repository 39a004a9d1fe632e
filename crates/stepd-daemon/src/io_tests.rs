use super::*;
use crate::test_support::test_context;

#[tokio::test]
async fn noop_pump_succeeds_on_every_call() {
    let pump = NoopIoPump;
    let ctx = test_context(1);
    assert!(pump.setup(&ctx).await.is_ok());
    assert!(pump.setup_spawn(&ctx).await.is_ok());
    pump.shutdown().await;
    assert!(pump.join().await.is_ok());
}

#[tokio::test]
async fn fake_pump_records_call_order() {
    let pump = FakeIoPump::new();
    let ctx = test_context(1);
    pump.setup(&ctx).await.unwrap();
    pump.shutdown().await;
    pump.join().await.unwrap();
    assert_eq!(pump.calls(), vec![IoCall::Setup, IoCall::Shutdown, IoCall::Join]);
}

#[tokio::test]
async fn fake_pump_propagates_queued_setup_failure() {
    let pump = FakeIoPump::new();
    pump.fail_setup("socket backend unavailable");
    let ctx = test_context(1);
    let err = pump.setup(&ctx).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Step(stepd_core::StepError::IoSetup(_))));
}

#[tokio::test]
async fn fake_pump_propagates_queued_join_failure() {
    let pump = FakeIoPump::new();
    pump.fail_join("pump thread panicked");
    let err = pump.join().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Step(stepd_core::StepError::IoSetup(_))));
}
