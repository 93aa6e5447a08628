use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures reported by a process supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessError {
    /// The transcoder could not be launched or exited during its startup grace period.
    /// Carries the diagnostic text captured from the process.
    SpawnFailed(String),
    /// The process group did not confirm exit within the termination bound.
    TerminateFailed(String),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::SpawnFailed(e) => write!(f, "Transcoder spawn failed: {}", e),
            ProcessError::TerminateFailed(e) => write!(f, "Transcoder termination failed: {}", e),
        }
    }
}

impl std::error::Error for ProcessError {}

#[derive(Debug)]
pub enum SinkError {
    CreateFailed(String, std::io::Error),
    ResolveFailed(String, std::io::Error),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::CreateFailed(dir, e) => {
                write!(f, "Failed to create output directory {}: {}", dir, e)
            }
            SinkError::ResolveFailed(dir, e) => {
                write!(f, "Failed to resolve output directory {}: {}", dir, e)
            }
        }
    }
}

impl std::error::Error for SinkError {}

/// Errors surfaced by the session control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Missing or malformed source URL.
    InvalidInput(String),
    AlreadyActive,
    NotActive,
    /// Start could not bring a transcoder up; carries the diagnostic text.
    StartFailed(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            SessionError::AlreadyActive => write!(f, "Stream is already running"),
            SessionError::NotActive => write!(f, "No active stream to stop"),
            SessionError::StartFailed(e) => write!(f, "Failed to start stream: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ProcessError> for SessionError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::SpawnFailed(diagnostic) => SessionError::StartFailed(diagnostic),
            ProcessError::TerminateFailed(e) => SessionError::StartFailed(e),
        }
    }
}

impl From<SinkError> for SessionError {
    fn from(err: SinkError) -> Self {
        SessionError::StartFailed(err.to_string())
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    SinkError(SinkError),
    WebError(WebError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::SinkError(e) => write!(f, "Output sink error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web server error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<SinkError> for ControllerError {
    fn from(err: SinkError) -> Self {
        ControllerError::SinkError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_keeps_diagnostic_when_lifted_into_session_error() {
        let err: SessionError = ProcessError::SpawnFailed("Connection refused".to_string()).into();
        assert_eq!(err, SessionError::StartFailed("Connection refused".to_string()));
        assert!(err.to_string().contains("Connection refused"));
    }

    #[test]
    fn conflict_errors_render_user_facing_messages() {
        assert_eq!(SessionError::AlreadyActive.to_string(), "Stream is already running");
        assert_eq!(SessionError::NotActive.to_string(), "No active stream to stop");
    }
}
