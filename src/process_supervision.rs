//! Process supervision subsystem.
//!
//! Owns the external transcoder process: spawning it detached in its own
//! process group, confirming it survives startup, probing liveness without
//! blocking, and killing the whole group with a bounded wait.
//!
//! Re-exports:
//! - [`ProcessSupervisor`]: the seam the session manager drives.
//! - [`TranscoderSupervisor`]: implementation backed by `tokio::process`.
//! - [`CommandSpec`], [`ProcessHandle`], [`TerminationStrategy`]: core types.
//!
//! Example (non-running):
//! ```ignore
//! use rtsp_relay::process_supervision::{CommandSpec, ProcessSupervisor, TranscoderSupervisor};
//! use std::time::Duration;
//!
//! let supervisor = TranscoderSupervisor::new(Duration::from_secs(2));
//! let spec = CommandSpec::new("sleep", vec!["30".to_string()]);
//! let handle = supervisor.spawn(&spec).await?;
//! supervisor.terminate(handle, Duration::from_secs(10)).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use std::time::Duration;

use crate::error_handling::types::ProcessError;

pub mod command_spec;
#[cfg(test)]
pub(crate) mod fake_supervisor;
#[cfg(all(test, unix))]
mod tests;
pub mod transcoder_supervisor;
pub mod types;

pub use command_spec::CommandSpec;
pub use transcoder_supervisor::TranscoderSupervisor;
pub use types::{ProcessHandle, TerminationStrategy};

/// Lifecycle operations on one supervised process.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Launches the process and waits out the startup grace period.
    ///
    /// Fails with [`ProcessError::SpawnFailed`] carrying the process's own
    /// error output when it cannot be launched or exits during the grace period.
    async fn spawn(&self, spec: &CommandSpec) -> Result<ProcessHandle, ProcessError>;

    /// Kills the process (and its group where supported) and waits up to
    /// `timeout` for the exit to be confirmed.
    async fn terminate(&self, handle: ProcessHandle, timeout: Duration)
        -> Result<(), ProcessError>;

    /// Non-blocking liveness probe.
    fn is_alive(&self, handle: &mut ProcessHandle) -> bool;
}
