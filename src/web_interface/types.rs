use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session_management::{SessionStats, StartedSession, StopOutcome};
use crate::status_reporting::StatusReport;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

/// Body of `POST /api/stream`. A missing `rtsp_url` is reported like an empty one.
#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    #[serde(default)]
    pub rtsp_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartStreamResponse {
    pub success: bool,
    pub message: String,
    pub stream_url: String,
    pub rtsp_url: String,
    pub session_id: Uuid,
}

impl From<StartedSession> for StartStreamResponse {
    fn from(started: StartedSession) -> Self {
        Self {
            success: true,
            message: "Stream started successfully".to_string(),
            stream_url: started.stream_url,
            rtsp_url: started.source_url,
            session_id: started.session_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StopStreamResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<StopOutcome> for StopStreamResponse {
    fn from(outcome: StopOutcome) -> Self {
        Self {
            success: true,
            message: "Stream stopped successfully".to_string(),
            warning: outcome.warning,
        }
    }
}

/// Envelope of the read-only endpoints.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

pub type StatusResponse = DataResponse<StatusReport>;
pub type StatsResponse = DataResponse<SessionStats>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy",
            message: "RTSP relay API is running",
        }
    }
}
