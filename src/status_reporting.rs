//! User-facing status derived from the session state.
//!
//! Building a report never touches the session; the crash check that may
//! precede it lives in [`SessionManager::status`](crate::session_management::session_manager::SessionManager::status).

use crate::session_management::session::SessionState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Snapshot returned by the Status operation.
///
/// Serialized with the field names the web client expects
/// (`is_streaming`, `rtsp_url`, `stream_url`, `start_time`, `uptime`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    #[serde(rename = "is_streaming")]
    pub active: bool,
    #[serde(rename = "rtsp_url")]
    pub source_url: Option<String>,
    pub stream_url: String,
    #[serde(rename = "start_time")]
    pub started_at: Option<DateTime<Utc>>,
    /// `HH:MM:SS`, absent while idle.
    pub uptime: Option<String>,
    pub session_id: Option<Uuid>,
}

impl StatusReport {
    pub fn idle(stream_url: String) -> Self {
        Self {
            active: false,
            source_url: None,
            stream_url,
            started_at: None,
            uptime: None,
            session_id: None,
        }
    }

    pub fn from_state(state: &SessionState, stream_url: String) -> Self {
        match state.active() {
            Some(session) => Self {
                active: true,
                source_url: Some(session.source_url.clone()),
                stream_url,
                started_at: Some(session.started_at),
                uptime: Some(format_uptime(session.uptime())),
                session_id: Some(session.id),
            },
            None => Self::idle(stream_url),
        }
    }
}

/// Formats elapsed time as zero-padded `HH:MM:SS`; hours keep growing past 99.
pub fn format_uptime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
