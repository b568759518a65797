//! Async stderr reader (non-UTF8-safe).
//!
//! Tool-servers may emit arbitrary bytes on stderr, and `BufReader::lines()`
//! would end the reader on invalid UTF-8. Lines are read as bytes and decoded
//! lossily. The most recent lines are kept so a crash can be reported with
//! the process's own last words.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

const TAIL_LINES: usize = 20;

/// Ring buffer of the last stderr lines of one process.
#[derive(Debug, Default)]
pub struct StderrTail {
    lines: Mutex<VecDeque<String>>,
}

impl StderrTail {
    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == TAIL_LINES {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    /// Last non-empty line, if any.
    pub fn last_line(&self) -> Option<String> {
        self.lines
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|l| !l.trim().is_empty())
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }
}

pub(crate) fn spawn_stderr_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    server_id: String,
    tail: Arc<StderrTail>,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    debug!(server_id = %server_id, "stderr: {}", line);
                    tail.push(line);
                }
                Err(e) => {
                    debug!(server_id = %server_id, error = %e, "stderr reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(server_id = %server_id, "stderr reader task exiting");
    });
}
