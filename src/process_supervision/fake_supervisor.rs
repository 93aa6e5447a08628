//! In-memory [`ProcessSupervisor`] for exercising the session layer
//! without launching processes.

use super::{CommandSpec, ProcessHandle, ProcessSupervisor};
use crate::error_handling::types::ProcessError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Supervisor that tracks fake processes in memory.
pub(crate) struct FakeSupervisor {
    spawn_delay: Duration,
    spawn_failure: Mutex<Option<String>>,
    terminate_fails: AtomicBool,
    next_pid: AtomicU32,
    alive: Mutex<HashMap<u32, bool>>,
    specs: Mutex<Vec<CommandSpec>>,
    terminated: Mutex<Vec<u32>>,
}

impl FakeSupervisor {
    pub(crate) fn new() -> Self {
        Self::with_spawn_delay(Duration::ZERO)
    }

    pub(crate) fn with_spawn_delay(spawn_delay: Duration) -> Self {
        Self {
            spawn_delay,
            spawn_failure: Mutex::new(None),
            terminate_fails: AtomicBool::new(false),
            next_pid: AtomicU32::new(1000),
            alive: Mutex::new(HashMap::new()),
            specs: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_spawns_with(&self, diagnostic: Option<&str>) {
        *self.spawn_failure.lock().unwrap() = diagnostic.map(str::to_string);
    }

    pub(crate) fn crash(&self, pid: u32) {
        self.alive.lock().unwrap().insert(pid, false);
    }

    pub(crate) fn spawn_count(&self) -> usize {
        self.specs.lock().unwrap().len()
    }

    pub(crate) fn live_processes(&self) -> usize {
        self.alive.lock().unwrap().values().filter(|alive| **alive).count()
    }

    pub(crate) fn terminated(&self) -> Vec<u32> {
        self.terminated.lock().unwrap().clone()
    }

    pub(crate) fn last_pid(&self) -> u32 {
        self.next_pid.load(Ordering::SeqCst) - 1
    }

    pub(crate) fn fail_terminations(&self, fail: bool) {
        self.terminate_fails.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn spawned_specs(&self) -> Vec<CommandSpec> {
        self.specs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessSupervisor for FakeSupervisor {
    async fn spawn(&self, spec: &CommandSpec) -> Result<ProcessHandle, ProcessError> {
        self.specs.lock().unwrap().push(spec.clone());
        tokio::time::sleep(self.spawn_delay).await;

        let failure = self.spawn_failure.lock().unwrap().clone();
        if let Some(diagnostic) = failure {
            return Err(ProcessError::SpawnFailed(diagnostic));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.alive.lock().unwrap().insert(pid, true);
        Ok(ProcessHandle::detached(pid))
    }

    async fn terminate(
        &self,
        handle: ProcessHandle,
        timeout: Duration,
    ) -> Result<(), ProcessError> {
        let pid = handle.pid();
        self.terminated.lock().unwrap().push(pid);
        if self.terminate_fails.load(Ordering::SeqCst) {
            return Err(ProcessError::TerminateFailed(format!(
                "pid {} did not exit within {:?}",
                pid, timeout
            )));
        }
        self.alive.lock().unwrap().insert(pid, false);
        Ok(())
    }

    fn is_alive(&self, handle: &mut ProcessHandle) -> bool {
        self.alive
            .lock()
            .unwrap()
            .get(&handle.pid())
            .copied()
            .unwrap_or(false)
    }
}
