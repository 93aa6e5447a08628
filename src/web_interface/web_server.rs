use log::info;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use super::routes::*;
use crate::error_handling::types::WebError;
use crate::session_management::SessionManager;

/// HTTP control plane of the relay: the stream API plus the HLS output files.
pub struct WebServer {
    session_manager: Arc<SessionManager>,
    stream_dir: PathBuf,
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new WebServer instance serving `stream_dir` under `/stream/`
    pub fn new(
        session_manager: Arc<SessionManager>,
        stream_dir: PathBuf,
        cors_origins: Vec<String>,
    ) -> Self {
        Self {
            session_manager,
            stream_dir,
            cors_origins,
        }
    }

    fn cors(&self) -> warp::cors::Cors {
        let builder = warp::cors()
            .allow_methods(vec!["GET", "POST", "DELETE"])
            .allow_headers(vec!["content-type"]);

        if self.cors_origins.iter().any(|origin| origin == "*") {
            builder.allow_any_origin().build()
        } else {
            builder
                .allow_origins(self.cors_origins.iter().map(String::as_str))
                .build()
        }
    }

    /// All routes, with JSON rejections and CORS applied.
    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        let manager = self.session_manager.clone();

        let api = start_stream_route(manager.clone())
            .or(stop_stream_route(manager.clone()))
            .or(stream_status_route(manager.clone()))
            .or(stream_stats_route(manager))
            .or(health_route());

        api.or(stream_files_route(self.stream_dir.clone()))
            .recover(handle_rejection)
            .with(self.cors())
    }

    /// Serves until `shutdown` resolves; in-flight requests are allowed to finish.
    pub async fn run<S>(&self, addr: SocketAddr, shutdown: S) -> Result<(), WebError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;

        info!("HTTP control plane listening on http://{}", bound);
        info!("HLS output served at http://{}/stream/", bound);
        server.await;
        info!("HTTP control plane stopped");
        Ok(())
    }
}
