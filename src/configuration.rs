pub mod config;
pub mod types;

pub use config::{Config, ConfigArgs};
pub use types::TranscoderPreset;
