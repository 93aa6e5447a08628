//! Output directory for the transcoder's HLS playlist and segments.
//!
//! The sink only guarantees that the directory exists and that its path stays
//! stable. Segment retention belongs to the transcoder's rolling playlist
//! window, so nothing here ever deletes files.

use crate::error_handling::types::SinkError;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Playlist file name, fixed for the static file server.
pub const PLAYLIST_FILE_NAME: &str = "out.m3u8";
/// Prefix shared by every segment file.
pub const SEGMENT_PREFIX: &str = "segment_";
/// Segment file extension (MPEG-TS).
pub const SEGMENT_EXTENSION: &str = "ts";
/// Width of the zero-padded segment index.
pub const SEGMENT_INDEX_WIDTH: usize = 3;
/// URL prefix under which the output directory is served.
pub const STREAM_ROUTE_PREFIX: &str = "/stream";

#[derive(Debug, Clone)]
pub struct OutputSink {
    base_dir: PathBuf,
}

impl OutputSink {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Configured directory, as given (possibly relative).
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Creates the output directory if needed and returns its absolute path.
    ///
    /// Idempotent; existing playlist and segment files are left in place.
    pub fn prepare(&self) -> Result<PathBuf, SinkError> {
        let display = self.base_dir.display().to_string();
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| SinkError::CreateFailed(display.clone(), e))?;
        let absolute = self
            .base_dir
            .canonicalize()
            .map_err(|e| SinkError::ResolveFailed(display, e))?;
        debug!("Output directory ready at {}", absolute.display());
        Ok(absolute)
    }

    /// Public path of the playlist, e.g. `/stream/out.m3u8`.
    pub fn stream_endpoint(&self) -> String {
        stream_endpoint()
    }

    pub fn log_layout(&self) {
        info!(
            "Serving {} and {} files from {}",
            PLAYLIST_FILE_NAME,
            segment_pattern(),
            self.base_dir.display()
        );
    }
}

pub fn stream_endpoint() -> String {
    format!("{}/{}", STREAM_ROUTE_PREFIX, PLAYLIST_FILE_NAME)
}

/// printf-style segment template handed to the transcoder: `segment_%03d.ts`.
pub fn segment_pattern() -> String {
    format!(
        "{}%0{}d.{}",
        SEGMENT_PREFIX, SEGMENT_INDEX_WIDTH, SEGMENT_EXTENSION
    )
}

/// Concrete name of the segment with the given index: `segment_007.ts`.
pub fn segment_file_name(index: u32) -> String {
    format!(
        "{}{:0width$}.{}",
        SEGMENT_PREFIX,
        index,
        SEGMENT_EXTENSION,
        width = SEGMENT_INDEX_WIDTH
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn prepare_creates_nested_directory_and_returns_absolute_path() {
        let tmp = TempDir::new().unwrap();
        let sink = OutputSink::new(tmp.path().join("a").join("stream"));

        let dir = sink.prepare().unwrap();

        assert!(dir.is_absolute());
        assert!(dir.is_dir());
        assert!(dir.ends_with("a/stream"));
    }

    #[test]
    fn prepare_is_idempotent_and_keeps_existing_segments() {
        let tmp = TempDir::new().unwrap();
        let sink = OutputSink::new(tmp.path());
        let dir = sink.prepare().unwrap();
        std::fs::write(dir.join(segment_file_name(0)), b"ts").unwrap();

        let again = sink.prepare().unwrap();

        assert_eq!(dir, again);
        assert!(again.join("segment_000.ts").exists());
    }

    #[test]
    fn prepare_fails_when_path_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        match OutputSink::new(&file).prepare() {
            Err(SinkError::CreateFailed(dir, _)) => assert!(dir.ends_with("occupied")),
            other => panic!("expected CreateFailed, got {:?}", other),
        }
    }

    #[test]
    fn naming_matches_static_server_contract() {
        assert_eq!(stream_endpoint(), "/stream/out.m3u8");
        assert_eq!(segment_pattern(), "segment_%03d.ts");
        assert_eq!(segment_file_name(0), "segment_000.ts");
        assert_eq!(segment_file_name(42), "segment_042.ts");
    }
}
