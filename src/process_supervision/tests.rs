//! Tests against real OS processes (`sh`, `sleep`).

use super::*;
use crate::error_handling::types::ProcessError;
use serial_test::serial;
use std::time::Duration;

const GRACE: Duration = Duration::from_millis(300);
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

fn shell(script: &str) -> CommandSpec {
    CommandSpec::new("sh", vec!["-c".to_string(), script.to_string()])
}

/// True while `pid` exists and is not a zombie.
#[cfg(target_os = "linux")]
fn is_running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => match stat.rsplit_once(") ") {
            Some((_, rest)) => !rest.starts_with('Z') && !rest.starts_with('X'),
            None => false,
        },
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
async fn wait_until_gone(pid: u32) -> bool {
    for _ in 0..40 {
        if !is_running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
#[serial]
async fn spawn_returns_handle_for_process_that_survives_grace() {
    let supervisor = TranscoderSupervisor::new(GRACE);

    let mut handle = supervisor
        .spawn(&shell("sleep 30"))
        .await
        .expect("sleep should survive the grace period");

    assert!(handle.pid() > 0);
    assert!(supervisor.is_alive(&mut handle));

    supervisor
        .terminate(handle, TERMINATE_TIMEOUT)
        .await
        .expect("sleep should die on SIGKILL");
}

#[tokio::test]
#[serial]
async fn spawned_process_leads_its_own_process_group() {
    let supervisor = TranscoderSupervisor::new(GRACE);
    let handle = supervisor.spawn(&shell("sleep 30")).await.unwrap();

    // SAFETY: getpgid only reads its argument.
    let pgid = unsafe { libc::getpgid(handle.pid() as libc::pid_t) };
    // SAFETY: as above, for the calling process.
    let own_pgid = unsafe { libc::getpgid(0) };
    assert_eq!(pgid, handle.pid() as libc::pid_t);
    assert_ne!(pgid, own_pgid);

    supervisor.terminate(handle, TERMINATE_TIMEOUT).await.unwrap();
}

#[tokio::test]
#[serial]
async fn early_exit_is_reported_with_process_stderr() {
    let supervisor = TranscoderSupervisor::new(Duration::from_secs(5));

    let started = std::time::Instant::now();
    let result = supervisor
        .spawn(&shell(
            "echo 'rtsp://10.0.0.9/feed: Connection refused' >&2; exit 1",
        ))
        .await;

    match result {
        Err(ProcessError::SpawnFailed(diagnostic)) => {
            assert!(diagnostic.contains("Connection refused"), "{}", diagnostic);
        }
        other => panic!("expected SpawnFailed, got {:?}", other.map(|h| h.pid())),
    }
    // the exit is noticed without sitting out the whole grace period
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
#[serial]
async fn silent_early_exit_still_has_diagnostic_text() {
    let supervisor = TranscoderSupervisor::new(GRACE);

    match supervisor.spawn(&shell("exit 7")).await {
        Err(ProcessError::SpawnFailed(diagnostic)) => {
            assert!(diagnostic.contains("exited during startup"), "{}", diagnostic);
        }
        other => panic!("expected SpawnFailed, got {:?}", other.map(|h| h.pid())),
    }
}

#[tokio::test]
#[serial]
async fn missing_binary_is_a_spawn_failure() {
    let supervisor = TranscoderSupervisor::new(GRACE);
    let spec = CommandSpec::new("/nonexistent/bin/ffmpeg", vec!["-version".to_string()]);

    match supervisor.spawn(&spec).await {
        Err(ProcessError::SpawnFailed(diagnostic)) => {
            assert!(diagnostic.contains("/nonexistent/bin/ffmpeg"), "{}", diagnostic);
        }
        other => panic!("expected SpawnFailed, got {:?}", other.map(|h| h.pid())),
    }
}

#[tokio::test]
#[serial]
async fn liveness_probe_notices_exit_after_startup() {
    let supervisor = TranscoderSupervisor::new(Duration::from_millis(100));
    let mut handle = supervisor
        .spawn(&shell("sleep 0.5; exit 3"))
        .await
        .expect("process is alive during the grace period");

    assert!(supervisor.is_alive(&mut handle));
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(!supervisor.is_alive(&mut handle));

    // reaping an exited process returns at once
    supervisor
        .terminate(handle, Duration::from_millis(500))
        .await
        .unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
#[serial]
async fn terminate_kills_forked_helpers_in_the_group() {
    let supervisor = TranscoderSupervisor::new(GRACE);
    let handle = supervisor
        .spawn(&shell("sleep 30 & echo helper=$! >&2; wait"))
        .await
        .unwrap();

    let helper: u32 = handle
        .recent_output()
        .iter()
        .find_map(|line| line.strip_prefix("helper=").map(str::to_string))
        .and_then(|pid| pid.trim().parse().ok())
        .expect("helper pid should be reported on stderr");
    let leader = handle.pid();
    assert!(is_running(helper));

    supervisor.terminate(handle, TERMINATE_TIMEOUT).await.unwrap();

    assert!(wait_until_gone(leader).await);
    assert!(wait_until_gone(helper).await, "helper {} outlived terminate", helper);
}

#[tokio::test]
#[serial]
async fn leader_only_strategy_still_terminates_the_leader() {
    let supervisor =
        TranscoderSupervisor::with_strategy(GRACE, TerminationStrategy::LeaderOnly);
    let handle = supervisor.spawn(&shell("exec sleep 30")).await.unwrap();

    supervisor.terminate(handle, TERMINATE_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn terminating_a_detached_handle_is_a_no_op() {
    let supervisor = TranscoderSupervisor::new(GRACE);
    let handle = ProcessHandle::detached(4242);

    assert!(supervisor.terminate(handle, TERMINATE_TIMEOUT).await.is_ok());
}

#[tokio::test]
async fn availability_check_fails_for_missing_program() {
    assert!(!TranscoderSupervisor::is_transcoder_available("/nonexistent/bin/ffmpeg").await);
}
