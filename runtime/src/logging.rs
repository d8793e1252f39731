use serde::Serialize;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt};

/// One formatted log line with its position in the stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub seq: u64,
    pub line: String,
}

struct Backlog {
    next_seq: u64,
    lines: VecDeque<LogRecord>,
}

/// Keeps the most recent log lines and fans new ones out to subscribers.
#[derive(Clone)]
pub struct LogHub {
    tx: broadcast::Sender<LogRecord>,
    backlog: Arc<Mutex<Backlog>>,
    capacity: usize,
}

impl LogHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            backlog: Arc::new(Mutex::new(Backlog {
                next_seq: 0,
                lines: VecDeque::with_capacity(capacity),
            })),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Backlog> {
        self.backlog.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a line and broadcast it.
    pub fn push(&self, line: impl Into<String>) {
        let record = {
            let mut backlog = self.lock();
            let record = LogRecord {
                seq: backlog.next_seq,
                line: line.into(),
            };
            backlog.next_seq += 1;
            backlog.lines.push_back(record.clone());
            while backlog.lines.len() > self.capacity {
                backlog.lines.pop_front();
            }
            record
        };
        let _ = self.tx.send(record);
    }

    /// Receive every line pushed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogRecord> {
        self.tx.subscribe()
    }

    /// Buffered lines with a sequence number above `after`, or all of them.
    pub fn messages_after(&self, after: Option<u64>) -> Vec<LogRecord> {
        self.lock()
            .lines
            .iter()
            .filter(|r| after.map_or(true, |a| r.seq > a))
            .cloned()
            .collect()
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Initialize logging to stdout, copying every line into `hub`.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(
    level: &str,
    hub: LogHub,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(move || TeeWriter {
            stdout: io::stdout(),
            hub: hub.clone(),
        })
        .try_init()
}

/// Writer that duplicates all output into a [`LogHub`].
struct TeeWriter {
    stdout: io::Stdout,
    hub: LogHub,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.stdout.write(buf)?;
        if let Ok(s) = std::str::from_utf8(&buf[..n]) {
            for line in s.lines().filter(|l| !l.trim().is_empty()) {
                self.hub.push(line.trim_end());
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlog_is_bounded() {
        let hub = LogHub::new(3);
        for i in 0..5 {
            hub.push(format!("line {i}"));
        }
        let lines: Vec<_> = hub.messages_after(None).into_iter().map(|r| r.line).collect();
        assert_eq!(lines, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn messages_after_filters_by_sequence() {
        let hub = LogHub::new(10);
        hub.push("a");
        hub.push("b");
        hub.push("c");
        let after = hub.messages_after(Some(0));
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], LogRecord { seq: 1, line: "b".into() });
    }

    #[tokio::test]
    async fn subscribers_receive_new_lines() {
        let hub = LogHub::new(10);
        let mut rx = hub.subscribe();
        hub.push("hello");
        assert_eq!(rx.recv().await.unwrap().line, "hello");
    }

    #[test]
    fn tee_writer_splits_lines() {
        let hub = LogHub::new(10);
        let mut writer = TeeWriter {
            stdout: io::stdout(),
            hub: hub.clone(),
        };
        writer.write_all(b"first\nsecond\n").unwrap();
        let lines: Vec<_> = hub.messages_after(None).into_iter().map(|r| r.line).collect();
        assert_eq!(lines, vec!["first", "second"]);
    }
}
