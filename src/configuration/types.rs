use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Named transcoder parameter sets.
///
/// - `Local`: low-resource `ultrafast` encoding, video only, 2 s segments.
/// - `Production`: stabilized delivery with audio, bitrate caps and stricter
///   source timeouts, 3 s segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TranscoderPreset {
    #[default]
    Local,
    Production,
}

impl TranscoderPreset {
    /// How long a freshly spawned transcoder must survive before it counts as started.
    pub fn default_spawn_grace(&self) -> Duration {
        match self {
            TranscoderPreset::Local => Duration::from_secs(2),
            TranscoderPreset::Production => Duration::from_secs(10),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TranscoderPreset::Local => "local",
            TranscoderPreset::Production => "production",
        }
    }
}

impl fmt::Display for TranscoderPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
