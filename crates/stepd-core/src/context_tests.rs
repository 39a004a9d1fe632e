use super::*;

#[test]
fn environment_preserves_insertion_order() {
    let mut env = Environment::new();
    env.set("B", "2");
    env.set("A", "1");
    let pairs: Vec<_> = env.iter().collect();
    assert_eq!(pairs, vec![("B", "2"), ("A", "1")]);
}

#[test]
fn environment_set_overwrites_in_place_without_reordering() {
    let mut env = Environment::new();
    env.set("A", "1");
    env.set("B", "2");
    env.set("A", "3");
    let pairs: Vec<_> = env.iter().collect();
    assert_eq!(pairs, vec![("A", "3"), ("B", "2")]);
}

#[test]
fn environment_remove_strips_prio_process() {
    let mut env = Environment::new();
    env.set("SLURM_PRIO_PROCESS", "5");
    env.set("PATH", "/bin");
    let removed = env.remove("SLURM_PRIO_PROCESS");
    assert_eq!(removed.as_deref(), Some("5"));
    assert_eq!(env.get("SLURM_PRIO_PROCESS"), None);
    assert_eq!(env.get("PATH"), Some("/bin"));
}

#[test]
fn to_assignment_strings_formats_key_equals_value() {
    let mut env = Environment::new();
    env.set("FOO", "bar");
    assert_eq!(env.to_assignment_strings(), vec!["FOO=bar".to_string()]);
}

#[test]
fn client_link_without_resp_addr_has_no_endpoint() {
    let link = ClientLink { client_addr: "127.0.0.1:1000".parse().unwrap(), resp_addr: None };
    assert!(!link.has_response_endpoint());
}

#[test]
fn jobacct_aggregate_sums_cumulative_and_maxes_highwater() {
    let mut a = JobAcct { user_cpu_usec: 10, sys_cpu_usec: 5, max_rss_kb: 100, max_vsize_kb: 200 };
    let b = JobAcct { user_cpu_usec: 3, sys_cpu_usec: 1, max_rss_kb: 150, max_vsize_kb: 90 };
    a.aggregate(&b);
    assert_eq!(a.user_cpu_usec, 13);
    assert_eq!(a.sys_cpu_usec, 6);
    assert_eq!(a.max_rss_kb, 150);
    assert_eq!(a.max_vsize_kb, 200);
}

#[test]
fn batch_dir_name_omits_step_for_no_step() {
    let ctx = test_context(StepId::NONE);
    assert_eq!(ctx.batch_dir_name(), "job00042");
}

#[test]
fn batch_dir_name_includes_step_when_present() {
    let ctx = test_context(StepId::from(3));
    assert_eq!(ctx.batch_dir_name(), "job00042.00003");
}

fn test_context(step_id: StepId) -> StepContext {
    StepContext {
        job_id: JobId::new(42),
        step_id,
        node_id: NodeId::new(0),
        ntasks: 1,
        nnodes: 1,
        is_batch: true,
        is_spawn: false,
        debug_level: 0,
        user: UserIdentity {
            uid: 1000,
            gid: 1000,
            name: "alice".into(),
            home: "/home/alice".into(),
            supplementary_gids: None,
        },
        container_id: None,
        tasks: Vec::new(),
        env: Environment::new(),
        clients: Vec::new(),
        argv: vec!["/bin/true".into()],
        pgid: None,
        cwd: "/tmp".into(),
        batch_dir: None,
        state: OrchestratorState::Init,
        jobacct: JobAcct::default(),
    }
}
