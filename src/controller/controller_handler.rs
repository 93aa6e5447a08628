use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::output_sink::OutputSink;
use crate::process_supervision::{ProcessSupervisor, TranscoderSupervisor};
use crate::session_management::{SessionManager, SessionSettings};
use crate::web_interface::web_server::WebServer;
use log::{error, info, warn};
use std::sync::Arc;

/// Wires the relay together and runs it until Ctrl-C.
pub struct Controller {
    pub config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Self {
        info!("Creating controller");
        Self { config }
    }

    /// Builds the output sink, supervisor, session manager and web server,
    /// then serves until shutdown. Any active session is stopped before
    /// returning, whether the server ended cleanly or not.
    pub async fn run(&self) -> Result<(), ControllerError> {
        let addr = self.config.socket_addr()?;

        let sink = OutputSink::new(&self.config.stream_dir);
        let stream_dir = sink.prepare()?;
        sink.log_layout();

        if TranscoderSupervisor::is_transcoder_available(&self.config.ffmpeg_path).await {
            info!("Transcoder {} is available", self.config.ffmpeg_path);
        } else {
            warn!(
                "Transcoder {} could not be run; starting streams will fail until it is installed",
                self.config.ffmpeg_path
            );
        }

        let supervisor: Arc<dyn ProcessSupervisor> =
            Arc::new(TranscoderSupervisor::new(self.config.spawn_grace()));
        let manager = Arc::new(SessionManager::new(
            supervisor,
            sink,
            SessionSettings::from_config(&self.config),
        ));

        self.auto_start(&manager).await;

        let server = WebServer::new(
            manager.clone(),
            stream_dir,
            self.config.cors_origins.clone(),
        );
        let served = server.run(addr, shutdown_signal()).await;

        self.shutdown(&manager).await;
        served.map_err(ControllerError::from)
    }

    /// Starts the configured default source. Failure leaves the service idle.
    async fn auto_start(&self, manager: &SessionManager) {
        let Some(url) = &self.config.auto_start_url else {
            return;
        };

        info!("Auto-starting stream from {}", url);
        match manager.start(url).await {
            Ok(started) => info!("Auto-started session {}", started.session_id),
            Err(e) => warn!("Auto-start failed, continuing idle: {}", e),
        }
    }

    async fn shutdown(&self, manager: &SessionManager) {
        info!("Shutting down");
        manager.shutdown().await;
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed the service runs
/// until killed.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => {
            error!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
