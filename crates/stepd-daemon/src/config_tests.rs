use super::*;
use serial_test::serial;

fn clear_env() {
    std::env::remove_var(ENV_NODE_NAME);
    std::env::remove_var(ENV_SPOOL_DIR);
    std::env::remove_var(ENV_CONTROLLER_ADDR);
}

#[test]
#[serial]
fn load_fails_when_node_name_is_missing() {
    clear_env();
    let err = NodeConfig::load().unwrap_err();
    assert!(matches!(err, ConfigError::MissingVar(ENV_NODE_NAME)));
}

#[test]
#[serial]
fn load_reads_all_three_required_variables() {
    clear_env();
    std::env::set_var(ENV_NODE_NAME, "node03");
    std::env::set_var(ENV_SPOOL_DIR, "/var/spool/stepd");
    std::env::set_var(ENV_CONTROLLER_ADDR, "10.0.0.1:6817");

    let cfg = NodeConfig::load().unwrap();
    assert_eq!(cfg.node_name, "node03");
    assert_eq!(cfg.spool_dir, PathBuf::from("/var/spool/stepd"));
    assert_eq!(cfg.controller_addr, "10.0.0.1:6817".parse().unwrap());
    assert_eq!(cfg.batch_max_retry, 240);
    assert_eq!(cfg.batch_retry_delay, Duration::from_secs(15));
    assert_eq!(cfg.task_epilog, None);
    assert_eq!(cfg.task_epilog_site, None);
    assert_eq!(cfg.pam_service, "slurm");
    clear_env();
}

#[test]
#[serial]
fn load_reads_pam_service_override_when_set() {
    clear_env();
    std::env::set_var(ENV_NODE_NAME, "node03");
    std::env::set_var(ENV_SPOOL_DIR, "/var/spool/stepd");
    std::env::set_var(ENV_CONTROLLER_ADDR, "10.0.0.1:6817");
    std::env::set_var(ENV_PAM_SERVICE, "slurm-site");

    let cfg = NodeConfig::load().unwrap();
    assert_eq!(cfg.pam_service, "slurm-site");

    std::env::remove_var(ENV_PAM_SERVICE);
    clear_env();
}

#[test]
#[serial]
fn load_reads_optional_epilog_paths_when_set() {
    clear_env();
    std::env::set_var(ENV_NODE_NAME, "node03");
    std::env::set_var(ENV_SPOOL_DIR, "/var/spool/stepd");
    std::env::set_var(ENV_CONTROLLER_ADDR, "10.0.0.1:6817");
    std::env::set_var(ENV_TASK_EPILOG, "/etc/stepd/task_epilog");
    std::env::set_var(ENV_TASK_EPILOG_SITE, "/etc/stepd/task_epilog.site");

    let cfg = NodeConfig::load().unwrap();
    assert_eq!(cfg.task_epilog, Some(PathBuf::from("/etc/stepd/task_epilog")));
    assert_eq!(cfg.task_epilog_site, Some(PathBuf::from("/etc/stepd/task_epilog.site")));

    std::env::remove_var(ENV_TASK_EPILOG);
    std::env::remove_var(ENV_TASK_EPILOG_SITE);
    clear_env();
}

#[test]
#[serial]
fn load_rejects_an_unparseable_controller_address() {
    clear_env();
    std::env::set_var(ENV_NODE_NAME, "node03");
    std::env::set_var(ENV_SPOOL_DIR, "/var/spool/stepd");
    std::env::set_var(ENV_CONTROLLER_ADDR, "not-an-address");

    let err = NodeConfig::load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidVar { name: ENV_CONTROLLER_ADDR, .. }));
    clear_env();
}
