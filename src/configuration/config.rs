use super::types::TranscoderPreset;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, info};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command-line arguments of the relay service.
///
/// Every field is optional: a value given here overrides the same key from the
/// TOML file named by `--config-file`, which in turn overrides the built-in
/// defaults of [`Config`].
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "rtsp-relay")]
#[command(version)]
#[command(about = "HTTP control plane for an RTSP to HLS relay")]
pub struct ConfigArgs {
    /// Path to a TOML configuration file
    #[arg(long, short = 'c', env = "RELAY_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Address the HTTP server binds to
    ///
    /// # Command Line
    /// Use `--bind-address <ADDRESS>` to set this value from the CLI
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Port the HTTP server listens on
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory receiving the playlist and segments
    #[arg(long)]
    pub stream_dir: Option<PathBuf>,

    /// Transcoder executable
    #[arg(long)]
    pub ffmpeg_path: Option<String>,

    /// Transcoder parameter set
    #[arg(long, value_enum)]
    pub preset: Option<TranscoderPreset>,

    /// Milliseconds a new transcoder must stay alive before Start reports success
    #[arg(long)]
    pub spawn_grace_ms: Option<u64>,

    /// Seconds to wait for the transcoder to exit after it was killed
    #[arg(long)]
    pub terminate_timeout_secs: Option<u64>,

    /// Source URL started automatically at boot
    #[arg(long, env = "RELAY_DEFAULT_RTSP_URL")]
    pub auto_start_url: Option<String>,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,
}

/// Runtime configuration of the relay service.
///
/// # Fields Overview
///
/// - `bind_address` / `port`: where the HTTP control plane listens
/// - `stream_dir`: output directory handed to the transcoder and served under `/stream/`
/// - `ffmpeg_path`: transcoder executable
/// - `preset`: named transcoder parameter set, see [`TranscoderPreset`]
/// - `spawn_grace_ms`: startup liveness window; the preset decides when unset
/// - `terminate_timeout_secs`: bound on waiting for exit confirmation during Stop
/// - `auto_start_url`: optional source started at boot
/// - `cors_origins`: browser origins allowed to call the API
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub stream_dir: PathBuf,
    pub ffmpeg_path: String,
    pub preset: TranscoderPreset,
    pub spawn_grace_ms: Option<u64>,
    pub terminate_timeout_secs: u64,
    pub auto_start_url: Option<String>,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            stream_dir: PathBuf::from("stream"),
            ffmpeg_path: "ffmpeg".to_string(),
            preset: TranscoderPreset::default(),
            spawn_grace_ms: None,
            terminate_timeout_secs: 10,
            auto_start_url: None,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Config {
    /// Reads and validates a TOML configuration file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration file {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the effective configuration: defaults, then the file, then CLI/env overrides.
    pub fn load(args: &ConfigArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config_file {
            Some(path) => {
                info!("Importing configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => {
                info!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(args);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, args: &ConfigArgs) {
        if let Some(bind_address) = &args.bind_address {
            self.bind_address = bind_address.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(stream_dir) = &args.stream_dir {
            self.stream_dir = stream_dir.clone();
        }
        if let Some(ffmpeg_path) = &args.ffmpeg_path {
            self.ffmpeg_path = ffmpeg_path.clone();
        }
        if let Some(preset) = args.preset {
            self.preset = preset;
        }
        if args.spawn_grace_ms.is_some() {
            self.spawn_grace_ms = args.spawn_grace_ms;
        }
        if let Some(timeout) = args.terminate_timeout_secs {
            self.terminate_timeout_secs = timeout;
        }
        if let Some(url) = &args.auto_start_url {
            // An empty env var disables auto-start rather than failing validation later.
            self.auto_start_url = Some(url.clone()).filter(|u| !u.trim().is_empty());
        }
        if let Some(origins) = &args.cors_origins {
            self.cors_origins = origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("port must be non-zero".to_string()));
        }
        self.bind_address.parse::<IpAddr>().map_err(|e| {
            ConfigError::InvalidValue(format!("bind_address {}: {}", self.bind_address, e))
        })?;
        if self.stream_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("stream_dir must not be empty".to_string()));
        }
        if self.ffmpeg_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue("ffmpeg_path must not be empty".to_string()));
        }
        if self.spawn_grace_ms == Some(0) {
            return Err(ConfigError::InvalidValue("spawn_grace_ms must be non-zero".to_string()));
        }
        if self.terminate_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "terminate_timeout_secs must be non-zero".to_string(),
            ));
        }
        for origin in &self.cors_origins {
            validate_origin(origin)?;
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self.bind_address.parse::<IpAddr>().map_err(|e| {
            ConfigError::InvalidValue(format!("bind_address {}: {}", self.bind_address, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn spawn_grace(&self) -> Duration {
        self.spawn_grace_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.preset.default_spawn_grace())
    }

    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_secs(self.terminate_timeout_secs)
    }
}

/// Accepts `*` or a bare `scheme://host[:port]` origin.
fn validate_origin(origin: &str) -> Result<(), ConfigError> {
    if origin == "*" {
        return Ok(());
    }
    let invalid = || ConfigError::InvalidValue(format!("cors origin {} is not a bare origin", origin));
    let parsed = url::Url::parse(origin).map_err(|_| invalid())?;
    if parsed.origin().ascii_serialization() != origin {
        return Err(invalid());
    }
    Ok(())
}
