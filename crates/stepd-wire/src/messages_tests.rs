use super::*;

#[test]
fn step_request_tag_is_the_variant_name() {
    let req = StepRequest::BatchJobLaunch {
        job_id: JobId::new(7),
        step_id: StepId::NONE,
        uid: 1000,
        script_bytes: b"#!/bin/sh\necho hi\n".to_vec(),
        nprocs: 1,
        cpu_groups: vec![0],
        nodes: 1,
    };
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(value["type"], "BatchJobLaunch");
    assert_eq!(value["uid"], 1000);
}

#[test]
fn outbound_launch_failure_has_nonzero_return_code_by_convention() {
    let msg = OutboundMessage::LaunchFailure {
        node_name: "node03".into(),
        srun_node_id: NodeId::new(2),
        return_code: -1,
    };
    let encoded = serde_json::to_string(&msg).unwrap();
    let decoded: OutboundMessage = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn task_exit_batches_multiple_global_ids_under_one_status() {
    let msg = OutboundMessage::TaskExit(MessageTaskExit {
        task_ids: vec![4, 5, 6],
        num_tasks: 3,
        return_code: 0,
    });
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["task_ids"].as_array().unwrap().len(), 3);
}
