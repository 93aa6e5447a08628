use log::{debug, error};
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use warp::hyper::body::Bytes;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::*;
use crate::error_handling::types::SessionError;
use crate::session_management::SessionManager;

/// Upper bound on the JSON body of a Start request.
const MAX_REQUEST_BODY: u64 = 16 * 1024;

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> reply::Response {
    reply::with_status(reply::json(body), status).into_response()
}

fn error_reply(message: impl Into<String>, status: StatusCode) -> reply::Response {
    json_reply(
        &ApiError {
            error: message.into(),
        },
        status,
    )
}

/// HTTP status class of each session failure.
pub fn session_error_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SessionError::AlreadyActive | SessionError::NotActive => StatusCode::CONFLICT,
        SessionError::StartFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn session_error_reply(err: &SessionError) -> reply::Response {
    error_reply(err.to_string(), session_error_status(err))
}

fn parse_start_request(body: &[u8]) -> Result<String, SessionError> {
    let request: StartStreamRequest = serde_json::from_slice(body).map_err(|e| {
        SessionError::InvalidInput(format!("request body is not valid JSON: {}", e))
    })?;
    Ok(request.rtsp_url.unwrap_or_default())
}

/// Runs a session operation on its own task so a client disconnecting
/// mid-request cannot cancel it halfway through a spawn or a kill.
async fn run_detached<T, F>(operation: F) -> Result<T, reply::Response>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation).await.map_err(|e| {
        error!("Session operation aborted: {}", e);
        error_reply("Internal server error", StatusCode::INTERNAL_SERVER_ERROR)
    })
}

/// POST /api/stream
pub fn start_stream_route(
    manager: Arc<SessionManager>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "stream")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_REQUEST_BODY))
        .and(warp::body::bytes())
        .and_then(move |body: Bytes| {
            let manager = manager.clone();
            async move {
                let source_url = match parse_start_request(&body) {
                    Ok(url) => url,
                    Err(e) => {
                        debug!("Rejecting start request: {}", e);
                        return Ok::<_, Rejection>(session_error_reply(&e));
                    }
                };

                let result = match run_detached(async move { manager.start(&source_url).await }).await {
                    Ok(result) => result,
                    Err(res) => return Ok::<_, Rejection>(res),
                };

                match result {
                    Ok(started) => Ok::<_, Rejection>(json_reply(
                        &StartStreamResponse::from(started),
                        StatusCode::OK,
                    )),
                    Err(e) => Ok::<_, Rejection>(session_error_reply(&e)),
                }
            }
        })
}

/// DELETE /api/stream
pub fn stop_stream_route(
    manager: Arc<SessionManager>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "stream")
        .and(warp::delete())
        .and_then(move || {
            let manager = manager.clone();
            async move {
                let result = match run_detached(async move { manager.stop().await }).await {
                    Ok(result) => result,
                    Err(res) => return Ok::<_, Rejection>(res),
                };

                match result {
                    Ok(outcome) => Ok::<_, Rejection>(json_reply(
                        &StopStreamResponse::from(outcome),
                        StatusCode::OK,
                    )),
                    Err(e) => Ok::<_, Rejection>(session_error_reply(&e)),
                }
            }
        })
}

/// GET /api/stream/status
pub fn stream_status_route(
    manager: Arc<SessionManager>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "stream" / "status")
        .and(warp::get())
        .and_then(move || {
            let manager = manager.clone();
            async move {
                match run_detached(async move { manager.status().await }).await {
                    Ok(report) => Ok::<_, Rejection>(json_reply(
                        &StatusResponse::new(report),
                        StatusCode::OK,
                    )),
                    Err(res) => Ok::<_, Rejection>(res),
                }
            }
        })
}

/// GET /api/stream/stats
pub fn stream_stats_route(
    manager: Arc<SessionManager>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "stream" / "stats")
        .and(warp::get())
        .and_then(move || {
            let manager = manager.clone();
            async move {
                let stats = manager.stats().await;
                Ok::<_, Rejection>(json_reply(&StatsResponse::new(stats), StatusCode::OK))
            }
        })
}

/// GET /api/health
pub fn health_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "health")
        .and(warp::get())
        .map(|| json_reply(&HealthResponse::default(), StatusCode::OK))
}

/// GET /stream/<file>: playlist and segments written by the transcoder.
pub fn stream_files_route(
    stream_dir: PathBuf,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("stream")
        .and(warp::get())
        .and(warp::fs::dir(stream_dir))
        .with(warp::reply::with::header("Cache-Control", "no-cache"))
}

/// Turns unmatched requests into JSON errors.
pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length header is required")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    Ok(error_reply(message, status))
}
