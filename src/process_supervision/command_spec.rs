use crate::configuration::types::TranscoderPreset;
use crate::output_sink::{segment_pattern, PLAYLIST_FILE_NAME};
use std::path::Path;

/// Full description of one transcoder invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Builds the ffmpeg invocation turning `source_url` into an HLS playlist
    /// and rolling segments inside `output_dir`.
    pub fn hls(
        program: &str,
        source_url: &str,
        output_dir: &Path,
        preset: TranscoderPreset,
    ) -> Self {
        let mut args: Vec<String> = Vec::new();

        if is_rtsp_source(source_url) {
            push_all(&mut args, &["-rtsp_transport", "tcp"]);
            if preset == TranscoderPreset::Production {
                // 5 s socket timeout, in microseconds
                push_all(&mut args, &["-rtsp_flags", "prefer_tcp", "-timeout", "5000000"]);
            }
        }
        push_all(&mut args, &["-i", source_url]);

        let (hls_time, hls_list_size, hls_flags) = match preset {
            TranscoderPreset::Local => {
                push_all(
                    &mut args,
                    &["-c:v", "libx264", "-preset", "ultrafast", "-tune", "zerolatency"],
                );
                ("2", "5", "delete_segments+independent_segments")
            }
            TranscoderPreset::Production => {
                push_all(
                    &mut args,
                    &[
                        "-c:v", "libx264", "-preset", "veryfast", "-tune", "zerolatency",
                        "-g", "50", "-sc_threshold", "0",
                        "-b:v", "1000k", "-maxrate", "1200k", "-bufsize", "2000k", "-r", "25",
                        "-c:a", "aac", "-b:a", "96k", "-ar", "44100", "-ac", "2", "-shortest",
                    ],
                );
                ("3", "6", "delete_segments+append_list+omit_endlist")
            }
        };

        push_all(
            &mut args,
            &[
                "-f", "hls",
                "-hls_time", hls_time,
                "-hls_list_size", hls_list_size,
                "-hls_flags", hls_flags,
                "-hls_segment_type", "mpegts",
            ],
        );
        args.push("-hls_segment_filename".to_string());
        args.push(output_dir.join(segment_pattern()).to_string_lossy().into_owned());
        push_all(&mut args, &["-start_number", "0"]);
        if preset == TranscoderPreset::Production {
            push_all(&mut args, &["-loglevel", "info"]);
        }
        args.push("-y".to_string());
        args.push(output_dir.join(PLAYLIST_FILE_NAME).to_string_lossy().into_owned());

        Self::new(program, args)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Human-readable command line for logs.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

/// TCP transport flags only make sense for RTSP demuxers; other inputs reject them.
fn is_rtsp_source(source_url: &str) -> bool {
    url::Url::parse(source_url)
        .map(|u| matches!(u.scheme(), "rtsp" | "rtsps"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn value_after<'a>(spec: &'a CommandSpec, flag: &str) -> Option<&'a str> {
        let args = spec.args();
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn local_preset_forces_tcp_and_low_latency_encoding() {
        let dir = PathBuf::from("/srv/stream");
        let spec = CommandSpec::hls("ffmpeg", "rtsp://example/feed", &dir, TranscoderPreset::Local);

        assert_eq!(spec.program(), "ffmpeg");
        assert_eq!(spec.args()[..4], ["-rtsp_transport", "tcp", "-i", "rtsp://example/feed"]);
        assert_eq!(value_after(&spec, "-preset"), Some("ultrafast"));
        assert_eq!(value_after(&spec, "-tune"), Some("zerolatency"));
        assert_eq!(value_after(&spec, "-hls_time"), Some("2"));
        assert_eq!(value_after(&spec, "-hls_list_size"), Some("5"));
        assert_eq!(
            value_after(&spec, "-hls_flags"),
            Some("delete_segments+independent_segments")
        );
        assert_eq!(
            value_after(&spec, "-hls_segment_filename"),
            Some("/srv/stream/segment_%03d.ts")
        );
        assert_eq!(value_after(&spec, "-start_number"), Some("0"));
        assert_eq!(spec.args().last().map(String::as_str), Some("/srv/stream/out.m3u8"));
        assert!(!spec.args().iter().any(|a| a == "-c:a"));
    }

    #[test]
    fn production_preset_adds_audio_and_stricter_source_timeouts() {
        let dir = PathBuf::from("/tmp/stream");
        let spec = CommandSpec::hls(
            "/usr/bin/ffmpeg",
            "rtsp://cam.local:554/live",
            &dir,
            TranscoderPreset::Production,
        );

        assert_eq!(value_after(&spec, "-rtsp_transport"), Some("tcp"));
        assert_eq!(value_after(&spec, "-rtsp_flags"), Some("prefer_tcp"));
        assert_eq!(value_after(&spec, "-timeout"), Some("5000000"));
        assert_eq!(value_after(&spec, "-preset"), Some("veryfast"));
        assert_eq!(value_after(&spec, "-c:a"), Some("aac"));
        assert_eq!(value_after(&spec, "-hls_time"), Some("3"));
        assert_eq!(value_after(&spec, "-hls_list_size"), Some("6"));
        assert_eq!(
            value_after(&spec, "-hls_flags"),
            Some("delete_segments+append_list+omit_endlist")
        );
        // input options must precede -i
        let input = spec.args().iter().position(|a| a == "-i").unwrap();
        let timeout = spec.args().iter().position(|a| a == "-timeout").unwrap();
        assert!(timeout < input);
    }

    #[test]
    fn non_rtsp_sources_skip_transport_flags() {
        let dir = PathBuf::from("/tmp/stream");
        let spec = CommandSpec::hls("ffmpeg", "/videos/sample.mp4", &dir, TranscoderPreset::Production);

        assert_eq!(spec.args()[0], "-i");
        assert!(!spec.args().iter().any(|a| a == "-rtsp_transport"));
    }

    #[test]
    fn display_line_joins_program_and_arguments() {
        let spec = CommandSpec::new("sh", vec!["-c".to_string(), "exit 0".to_string()]);
        assert_eq!(spec.display_line(), "sh -c exit 0");
    }
}
