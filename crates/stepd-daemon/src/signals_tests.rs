use super::*;

#[test]
fn manager_sigset_contains_every_named_signal() {
    let set = manager_sigset();
    for sig in [
        Signal::SIGINT,
        Signal::SIGTERM,
        Signal::SIGTSTP,
        Signal::SIGQUIT,
        Signal::SIGPIPE,
        Signal::SIGUSR1,
        Signal::SIGUSR2,
        Signal::SIGALRM,
        Signal::SIGHUP,
    ] {
        assert!(set.contains(sig));
    }
}

#[test]
fn manager_sigset_excludes_sigkill_and_sigstop() {
    let set = manager_sigset();
    assert!(!set.contains(Signal::SIGKILL));
    assert!(!set.contains(Signal::SIGSTOP));
}

#[test]
fn block_and_unblock_round_trip_without_error() {
    block_manager_signals().unwrap();
    unblock_manager_signals();
}
