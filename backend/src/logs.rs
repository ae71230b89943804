//! Pipeline log broadcasting.
//!
//! Every log line goes to stdout and to a broadcast channel. The CLI can
//! subscribe to the channel and persist the run log as JSON lines
//! (`--log-json`).

use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all subscribers
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    /// Print a log entry and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(entry.indent as usize);
        match entry.level {
            LogLevel::Warning | LogLevel::Error => eprintln!("{}{} {}", indent, prefix, entry.message),
            _ => println!("{}{} {}", indent, prefix, entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Append every broadcast entry to `path` as one JSON object per line.
///
/// The returned task ends when `shutdown` fires; entries already queued are
/// flushed first.
pub async fn spawn_json_sink(
    path: &Path,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut receiver = LOG_BROADCASTER.subscribe();

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Ok(entry) => write_entry(&mut file, &entry).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = &mut shutdown => {
                    while let Ok(entry) = receiver.try_recv() {
                        write_entry(&mut file, &entry).await;
                    }
                    break;
                }
            }
        }
        let _ = file.flush().await;
    }))
}

async fn write_entry(file: &mut tokio::fs::File, entry: &LogEntry) {
    if let Ok(mut line) = serde_json::to_vec(entry) {
        line.push(b'\n');
        let _ = file.write_all(&line).await;
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_lowercase_level() {
        let entry = LogEntry::warning("skipped YEM").with_indent(1);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "skipped YEM");
        assert_eq!(json["indent"], 1);
    }

    #[test]
    fn test_subscriber_receives_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.log(LogEntry::success("done"));
        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Success);
        assert_eq!(entry.message, "done");
    }

    #[tokio::test]
    async fn test_json_sink_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = spawn_json_sink(&path, rx).await.unwrap();

        log_info("json sink line");
        let _ = tx.send(());
        handle.await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.lines().any(|l| l.contains("json sink line")));
    }
}
