//! Core types used by the process supervision subsystem.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;

/// Number of stderr lines kept for diagnostics.
pub const DIAGNOSTIC_TAIL_LINES: usize = 40;
/// Longest stderr line kept; the rest of an overlong line is dropped.
pub const MAX_DIAGNOSTIC_LINE_LEN: usize = 4096;

/// How the supervisor kills a transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStrategy {
    /// SIGKILL to the whole process group, helpers included (unix).
    ProcessGroup,
    /// Kill only the leading process (platforms without process groups).
    LeaderOnly,
}

impl TerminationStrategy {
    pub fn for_platform() -> Self {
        if cfg!(unix) {
            TerminationStrategy::ProcessGroup
        } else {
            TerminationStrategy::LeaderOnly
        }
    }
}

/// Bounded ring of the most recent stderr lines of a process.
#[derive(Debug, Clone)]
pub struct DiagnosticTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl DiagnosticTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn joined(&self) -> String {
        self.snapshot().join("\n")
    }
}

/// Reads a diagnostic stream until EOF, logging each line and keeping the tail.
///
/// Both `\n` and `\r` end a line: ffmpeg rewrites its progress line with
/// carriage returns, which would otherwise grow into one unbounded line.
pub async fn drain_diagnostics<R>(stream: R, label: String, tail: DiagnosticTail)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line: Vec<u8> = Vec::new();

    loop {
        let consumed = match reader.fill_buf().await {
            Ok([]) => break,
            Ok(buf) => {
                for &byte in buf {
                    if byte == b'\n' || byte == b'\r' {
                        flush_line(&mut line, &label, &tail);
                    } else if line.len() < MAX_DIAGNOSTIC_LINE_LEN {
                        line.push(byte);
                    }
                }
                buf.len()
            }
            Err(e) => {
                debug!("[{}] stderr read error: {}", label, e);
                break;
            }
        };
        reader.consume(consumed);
    }

    flush_line(&mut line, &label, &tail);
    debug!("[{}] stderr monitoring ended", label);
}

fn flush_line(line: &mut Vec<u8>, label: &str, tail: &DiagnosticTail) {
    if line.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(line).trim_end().to_string();
    line.clear();
    if text.is_empty() {
        return;
    }
    debug!("[{}][stderr] {}", label, text);
    tail.push(text);
}

/// Exclusive handle on one supervised transcoder.
///
/// Only the supervisor that created it can probe or terminate the process;
/// callers hold it and hand it back.
#[derive(Debug)]
pub struct ProcessHandle {
    pub(crate) pid: u32,
    pub(crate) process_group: Option<i32>,
    pub(crate) child: Option<Child>,
    pub(crate) diagnostics: DiagnosticTail,
    pub(crate) drain: Option<JoinHandle<()>>,
    pub(crate) spawned_at: DateTime<Utc>,
}

impl ProcessHandle {
    pub(crate) fn new(
        child: Child,
        pid: u32,
        process_group: Option<i32>,
        diagnostics: DiagnosticTail,
        drain: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            pid,
            process_group,
            child: Some(child),
            diagnostics,
            drain,
            spawned_at: Utc::now(),
        }
    }

    /// Handle with no OS process behind it, for supervisors that track
    /// liveness themselves.
    #[cfg(test)]
    pub(crate) fn detached(pid: u32) -> Self {
        Self {
            pid,
            process_group: None,
            child: None,
            diagnostics: DiagnosticTail::new(DIAGNOSTIC_TAIL_LINES),
            drain: None,
            spawned_at: Utc::now(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn spawned_at(&self) -> DateTime<Utc> {
        self.spawned_at
    }

    /// Most recent stderr lines of the process.
    pub fn recent_output(&self) -> Vec<String> {
        self.diagnostics.snapshot()
    }
}
