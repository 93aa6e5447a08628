use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::session::{ActiveSession, SessionState};
use super::SessionStats;
use crate::configuration::config::Config;
use crate::configuration::types::TranscoderPreset;
use crate::error_handling::types::SessionError;
use crate::output_sink::OutputSink;
use crate::process_supervision::{CommandSpec, ProcessSupervisor};
use crate::status_reporting::StatusReport;

/// Bound on reaping a transcoder found dead during a status read.
const CRASH_REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// Transcoder parameters the manager needs for every Start and Stop.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub ffmpeg_path: String,
    pub preset: TranscoderPreset,
    pub terminate_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            preset: config.preset,
            terminate_timeout: config.terminate_timeout(),
        }
    }
}

/// Result of a successful Start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedSession {
    pub session_id: Uuid,
    pub source_url: String,
    pub stream_url: String,
    pub started_at: DateTime<Utc>,
}

/// Result of a successful Stop. `warning` is set when the transcoder did not
/// confirm its exit; the session is idle either way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopOutcome {
    pub session_id: Uuid,
    pub source_url: String,
    pub warning: Option<String>,
}

struct ManagerState {
    session: SessionState,
    stats: SessionStats,
}

/// Owner of the one relay session.
///
/// Every check-then-act sequence (Start, Stop, and the crash check done by
/// Status) runs under a single async mutex that stays held across the spawn
/// and termination waits. Concurrent Starts therefore serialize: the loser
/// either sees the committed session and gets `AlreadyActive`, or waits for
/// the winner to finish first.
///
/// # Fields Overview
///
/// - `supervisor`: spawns, probes and kills the transcoder
/// - `sink`: output directory the transcoder writes into
/// - `settings`: transcoder binary, preset and termination bound
/// - `state`: the session plus lifetime counters, behind the mutex
pub struct SessionManager {
    supervisor: Arc<dyn ProcessSupervisor>,
    sink: OutputSink,
    settings: SessionSettings,
    state: Mutex<ManagerState>,
}

impl SessionManager {
    pub fn new(
        supervisor: Arc<dyn ProcessSupervisor>,
        sink: OutputSink,
        settings: SessionSettings,
    ) -> Self {
        info!(
            "Initializing SessionManager (preset {}, output {})",
            settings.preset,
            sink.base_dir().display()
        );
        Self {
            supervisor,
            sink,
            settings,
            state: Mutex::new(ManagerState {
                session: SessionState::Idle,
                stats: SessionStats::default(),
            }),
        }
    }

    pub fn stream_endpoint(&self) -> String {
        self.sink.stream_endpoint()
    }

    /// Starts relaying `source_url`.
    ///
    /// Fails with `InvalidInput` before touching any state, `AlreadyActive`
    /// when a session exists, or `StartFailed` when the output directory or
    /// the transcoder cannot be brought up. A failed Start leaves the manager
    /// idle and retryable.
    pub async fn start(&self, source_url: &str) -> Result<StartedSession, SessionError> {
        let source_url = validate_source_url(source_url)?;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(active) = state.session.active() {
            debug!(
                "Rejecting start of {}: session {} already relays {}",
                source_url, active.id, active.source_url
            );
            return Err(SessionError::AlreadyActive);
        }

        let output_dir = match self.sink.prepare() {
            Ok(dir) => dir,
            Err(e) => {
                error!("Output directory unavailable: {}", e);
                state.stats.spawn_failures += 1;
                return Err(e.into());
            }
        };

        let spec = CommandSpec::hls(
            &self.settings.ffmpeg_path,
            &source_url,
            &output_dir,
            self.settings.preset,
        );

        match self.supervisor.spawn(&spec).await {
            Ok(handle) => {
                let session = ActiveSession::new(source_url, handle);
                let started = StartedSession {
                    session_id: session.id,
                    source_url: session.source_url.clone(),
                    stream_url: self.stream_endpoint(),
                    started_at: session.started_at,
                };
                info!(
                    "Session {} started: {} -> {} (pid {})",
                    session.id,
                    session.source_url,
                    started.stream_url,
                    session.pid()
                );
                state.session = SessionState::Active(session);
                state.stats.sessions_started += 1;
                Ok(started)
            }
            Err(e) => {
                error!("Failed to start session for {}: {}", source_url, e);
                state.stats.spawn_failures += 1;
                Err(e.into())
            }
        }
    }

    /// Stops the active session.
    ///
    /// The session is cleared even when the transcoder does not confirm its
    /// exit in time; that case is returned as a warning on the outcome.
    pub async fn stop(&self) -> Result<StopOutcome, SessionError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let session = match std::mem::take(&mut state.session) {
            SessionState::Active(session) => session,
            SessionState::Idle => {
                debug!("Stop requested while idle");
                return Err(SessionError::NotActive);
            }
        };

        let session_id = session.id;
        let source_url = session.source_url.clone();
        let pid = session.pid();
        info!("Stopping session {} (pid {})", session_id, pid);

        let warning = match self
            .supervisor
            .terminate(session.into_handle(), self.settings.terminate_timeout)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                state.stats.terminate_failures += 1;
                warn!(
                    "Session {}: {}; marking idle anyway, pid {} may still be running",
                    session_id, e, pid
                );
                Some(e.to_string())
            }
        };

        state.stats.sessions_stopped += 1;
        info!("Session {} stopped", session_id);
        Ok(StopOutcome {
            session_id,
            source_url,
            warning,
        })
    }

    /// Reports the current status.
    ///
    /// This read may write: when the session is active but its transcoder has
    /// exited, the session is cleared (and the process group reaped) before
    /// the report is built, so a crash is never reported as active past the
    /// first status query after it.
    pub async fn status(&self) -> StatusReport {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let crashed = match &mut state.session {
            SessionState::Active(session) => !self.supervisor.is_alive(session.handle_mut()),
            SessionState::Idle => false,
        };

        if crashed {
            if let SessionState::Active(session) = std::mem::take(&mut state.session) {
                state.stats.crashes_detected += 1;
                let last_output = session.recent_output().join(" | ");
                warn!(
                    "Session {} transcoder (pid {}) exited unexpectedly, clearing session. Last output: {}",
                    session.id,
                    session.pid(),
                    if last_output.is_empty() { "<none>" } else { last_output.as_str() }
                );
                if let Err(e) = self
                    .supervisor
                    .terminate(session.into_handle(), CRASH_REAP_TIMEOUT)
                    .await
                {
                    state.stats.terminate_failures += 1;
                    warn!("Reaping crashed transcoder failed: {}", e);
                }
            }
        }

        StatusReport::from_state(&state.session, self.stream_endpoint())
    }

    pub async fn stats(&self) -> SessionStats {
        self.state.lock().await.stats.clone()
    }

    /// Stops the active session, if any. Used on service shutdown.
    pub async fn shutdown(&self) {
        match self.stop().await {
            Ok(outcome) => match outcome.warning {
                Some(warning) => warn!("Shutdown stop of session {}: {}", outcome.session_id, warning),
                None => info!("Session {} stopped for shutdown", outcome.session_id),
            },
            Err(SessionError::NotActive) => debug!("No active session at shutdown"),
            Err(e) => error!("Failed to stop session at shutdown: {}", e),
        }
    }
}

/// Accepts a non-empty absolute URL, trimmed of surrounding whitespace.
fn validate_source_url(source_url: &str) -> Result<String, SessionError> {
    let trimmed = source_url.trim();
    if trimmed.is_empty() {
        return Err(SessionError::InvalidInput("RTSP URL is required".to_string()));
    }
    url::Url::parse(trimmed).map_err(|e| {
        SessionError::InvalidInput(format!("malformed source URL {}: {}", trimmed, e))
    })?;
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn blank_urls_are_rejected() {
        assert_eq!(
            validate_source_url("   "),
            Err(SessionError::InvalidInput("RTSP URL is required".to_string()))
        );
    }

    #[test]
    fn relative_paths_are_malformed() {
        assert!(matches!(
            validate_source_url("cameras/18"),
            Err(SessionError::InvalidInput(_))
        ));
    }

    #[test]
    fn urls_are_trimmed() {
        assert_eq!(
            validate_source_url("  rtsp://example/feed \n").unwrap(),
            "rtsp://example/feed"
        );
    }
}
