use crate::process_supervision::ProcessHandle;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

/// The single relay session.
///
/// Source URL, start time and process handle exist only inside `Active`, so
/// they can never be set or cleared separately.
#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Active(ActiveSession),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Active(session) => Some(session),
            SessionState::Idle => None,
        }
    }
}

/// A session backed by a running transcoder.
#[derive(Debug)]
pub struct ActiveSession {
    pub id: Uuid,
    pub source_url: String,
    pub started_at: DateTime<Utc>,
    started_instant: Instant,
    handle: ProcessHandle,
}

impl ActiveSession {
    pub fn new(source_url: String, handle: ProcessHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_url,
            started_at: Utc::now(),
            started_instant: Instant::now(),
            handle,
        }
    }

    /// Monotonic time since the session became active.
    pub fn uptime(&self) -> std::time::Duration {
        self.started_instant.elapsed()
    }

    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }

    /// Last stderr lines of the transcoder.
    pub fn recent_output(&self) -> Vec<String> {
        self.handle.recent_output()
    }

    pub(crate) fn handle_mut(&mut self) -> &mut ProcessHandle {
        &mut self.handle
    }

    pub(crate) fn into_handle(self) -> ProcessHandle {
        self.handle
    }
}
