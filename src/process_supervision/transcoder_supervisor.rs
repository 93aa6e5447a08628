use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

use super::command_spec::CommandSpec;
use super::types::{
    drain_diagnostics, DiagnosticTail, ProcessHandle, TerminationStrategy, DIAGNOSTIC_TAIL_LINES,
};
use super::ProcessSupervisor;
use crate::error_handling::types::ProcessError;

/// Upper bound on collecting stderr from a transcoder that died during startup.
const DIAGNOSTIC_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Supervises real OS processes through `tokio::process`.
///
/// Design notes:
/// - Children run in their own process group so signals aimed at the service
///   (Ctrl-C in a terminal) do not reach them, and so the whole subtree can be
///   killed at once.
/// - stderr is drained continuously by a background task; the last lines are
///   kept for diagnostics and everything is logged at debug level.
pub struct TranscoderSupervisor {
    spawn_grace: Duration,
    termination: TerminationStrategy,
}

impl TranscoderSupervisor {
    pub fn new(spawn_grace: Duration) -> Self {
        Self::with_strategy(spawn_grace, TerminationStrategy::for_platform())
    }

    pub fn with_strategy(spawn_grace: Duration, termination: TerminationStrategy) -> Self {
        info!(
            "Initializing TranscoderSupervisor (grace {:?}, termination {:?})",
            spawn_grace, termination
        );
        Self {
            spawn_grace,
            termination,
        }
    }

    pub fn spawn_grace(&self) -> Duration {
        self.spawn_grace
    }

    /// Checks whether `program -version` runs successfully on this host.
    pub async fn is_transcoder_available(program: &str) -> bool {
        let probe = Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        let available = matches!(
            tokio::time::timeout(Duration::from_secs(5), probe).await,
            Ok(Ok(status)) if status.success()
        );
        debug!("{} availability check: {}", program, available);
        available
    }

    fn build_command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);

        cmd
    }

    /// Sends the kill signal according to the termination strategy.
    fn send_kill(&self, child: &mut Child, process_group: Option<i32>) -> std::io::Result<()> {
        match (self.termination, process_group) {
            #[cfg(unix)]
            (TerminationStrategy::ProcessGroup, Some(pgid)) => {
                signal_process_group(pgid, libc::SIGKILL)
            }
            _ => child.start_kill(),
        }
    }

    /// Collects the diagnostic text of a process that already exited.
    async fn collect_diagnostics(
        drain: Option<tokio::task::JoinHandle<()>>,
        tail: &DiagnosticTail,
    ) -> String {
        if let Some(drain) = drain {
            if tokio::time::timeout(DIAGNOSTIC_DRAIN_TIMEOUT, drain)
                .await
                .is_err()
            {
                debug!("stderr drain did not finish within {:?}", DIAGNOSTIC_DRAIN_TIMEOUT);
            }
        }
        tail.joined()
    }
}

#[async_trait]
impl ProcessSupervisor for TranscoderSupervisor {
    async fn spawn(&self, spec: &CommandSpec) -> Result<ProcessHandle, ProcessError> {
        debug!("Spawning transcoder: {}", spec.display_line());

        let mut child = Self::build_command(spec).spawn().map_err(|e| {
            error!("Failed to launch {}: {}", spec.program(), e);
            ProcessError::SpawnFailed(format!("failed to launch {}: {}", spec.program(), e))
        })?;

        let pid = match child.id() {
            Some(pid) => pid,
            None => {
                return Err(ProcessError::SpawnFailed(format!(
                    "{} exited before its pid could be read",
                    spec.program()
                )))
            }
        };
        let process_group = if cfg!(unix) { i32::try_from(pid).ok() } else { None };

        let tail = DiagnosticTail::new(DIAGNOSTIC_TAIL_LINES);
        let drain = child.stderr.take().map(|stderr| {
            tokio::spawn(drain_diagnostics(
                stderr,
                format!("transcoder:{}", pid),
                tail.clone(),
            ))
        });

        debug!("Transcoder pid {} spawned, waiting {:?} for startup", pid, self.spawn_grace);

        let early_exit = tokio::select! {
            _ = tokio::time::sleep(self.spawn_grace) => None,
            status = child.wait() => Some(status),
        };
        let exit_status = match early_exit {
            Some(status) => status.map(Some),
            None => child.try_wait(),
        };

        match exit_status {
            Ok(None) => {
                info!("Transcoder pid {} survived startup grace period", pid);
                Ok(ProcessHandle::new(child, pid, process_group, tail, drain))
            }
            Ok(Some(status)) => {
                // helpers forked by the leader may still hold the group
                if let Err(e) = self.send_kill(&mut child, process_group) {
                    debug!("Cleanup kill for exited pid {}: {}", pid, e);
                }
                let output = Self::collect_diagnostics(drain, &tail).await;
                warn!("Transcoder pid {} exited during startup with {}", pid, status);
                let diagnostic = if output.is_empty() {
                    format!("transcoder exited during startup with {}", status)
                } else {
                    format!("transcoder exited during startup with {}: {}", status, output)
                };
                Err(ProcessError::SpawnFailed(diagnostic))
            }
            Err(e) => {
                if let Err(kill_err) = self.send_kill(&mut child, process_group) {
                    warn!("Failed to kill unprobeable pid {}: {}", pid, kill_err);
                }
                error!("Failed to probe transcoder pid {}: {}", pid, e);
                Err(ProcessError::SpawnFailed(format!(
                    "failed to probe transcoder pid {}: {}",
                    pid, e
                )))
            }
        }
    }

    async fn terminate(
        &self,
        mut handle: ProcessHandle,
        timeout: Duration,
    ) -> Result<(), ProcessError> {
        let pid = handle.pid;
        let Some(mut child) = handle.child.take() else {
            debug!("No process attached to handle for pid {}", pid);
            return Ok(());
        };

        debug!("Terminating transcoder pid {} ({:?})", pid, self.termination);
        if let Err(e) = self.send_kill(&mut child, handle.process_group) {
            // ESRCH and already-reaped children land here; the wait below settles it
            debug!("Kill signal for pid {} not delivered: {}", pid, e);
        }

        let result = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                info!("Transcoder pid {} exited with {}", pid, status);
                Ok(())
            }
            Ok(Err(e)) => Err(ProcessError::TerminateFailed(format!(
                "failed to wait for pid {}: {}",
                pid, e
            ))),
            Err(_) => Err(ProcessError::TerminateFailed(format!(
                "pid {} did not exit within {:?}",
                pid, timeout
            ))),
        };

        if let Some(drain) = handle.drain.take() {
            drain.abort();
        }
        result
    }

    fn is_alive(&self, handle: &mut ProcessHandle) -> bool {
        let pid = handle.pid;
        match handle.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    debug!("Transcoder pid {} has exited with {}", pid, status);
                    false
                }
                Err(e) => {
                    warn!("Liveness probe for pid {} failed: {}", pid, e);
                    false
                }
            },
            None => false,
        }
    }
}

#[cfg(unix)]
fn signal_process_group(pgid: i32, signal: libc::c_int) -> std::io::Result<()> {
    // SAFETY: killpg only reads its integer arguments.
    let result = unsafe { libc::killpg(pgid as libc::pid_t, signal) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
