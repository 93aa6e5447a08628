//! Session management core module.
//!
//! This module owns the single relay session: the state it can be in, the
//! manager serializing Start/Stop/Status against concurrent callers, and the
//! lifetime counters operators read to spot crashes and unconfirmed kills.

use serde::Serialize;

/// Submodule for the session state and the active-session record.
pub mod session;
/// Submodule for session manager implementation.
pub mod session_manager;

pub use session::{ActiveSession, SessionState};
pub use session_manager::{SessionManager, SessionSettings, StartedSession, StopOutcome};

/// Lifetime counters of the session manager.
///
/// `terminate_failures` counts transcoders that did not confirm their exit;
/// each one may have left a process behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub crashes_detected: u64,
    pub spawn_failures: u64,
    pub terminate_failures: u64,
}
