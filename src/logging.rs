//! Asynchronous logging channel.
//!
//! Every component publishes [`LogEvent`]s through a cloned [`LogChannel`]
//! handle; a single consumer task forwards them to the `tracing` sink. The
//! channel is unbounded and events below the configured level are filtered
//! on the producer side, so a slow or disabled sink can never stall the
//! serving path. A [`Level::Fatal`] event terminates the process with exit
//! code 1 once the sink has written it.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Log severity. Ordered `Debug < Info < Warning < Error < Fatal`;
/// `Disabled` is a pseudo-level that suppresses all output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Disabled,
}

/// A structured, leveled message with field data.
#[derive(Debug)]
pub struct LogEvent {
    pub level: Level,
    pub message: &'static str,
    pub fields: Vec<(&'static str, String)>,
}

/// Per-connection summary, emitted exactly once on every pipeline exit.
#[derive(Debug)]
pub struct RequestSummary {
    pub method: String,
    pub uri: String,
    /// 0 when the connection was aborted before any response.
    pub status: u16,
    pub duration: Duration,
    pub remote: String,
    pub transport: &'static str,
}

/// Producer handle for the log channel. Cheap to clone; publishing never
/// blocks.
#[derive(Clone)]
pub struct LogChannel {
    tx: mpsc::UnboundedSender<LogEvent>,
    level: Level,
}

impl LogChannel {
    pub fn new(level: Level) -> (Self, mpsc::UnboundedReceiver<LogEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, level }, rx)
    }

    /// Publishes an event unless the configured level filters it out.
    /// Fatal events bypass the filter: the process must still terminate
    /// even when output is suppressed.
    pub fn publish(&self, event: LogEvent) {
        if event.level < Level::Fatal && (self.level == Level::Disabled || event.level < self.level)
        {
            return;
        }
        let _ = self.tx.send(event);
    }

    pub fn debug(&self, message: &'static str, fields: Vec<(&'static str, String)>) {
        self.publish(LogEvent { level: Level::Debug, message, fields });
    }

    pub fn info(&self, message: &'static str, fields: Vec<(&'static str, String)>) {
        self.publish(LogEvent { level: Level::Info, message, fields });
    }

    pub fn error(&self, message: &'static str, err: &dyn std::fmt::Display) {
        self.publish(LogEvent {
            level: Level::Error,
            message,
            fields: vec![("error", err.to_string())],
        });
    }

    /// Publishes a fatal event. Never returns: the caller parks until the
    /// consumer has flushed the event and terminated the process.
    pub async fn fatal(&self, message: &'static str, err: &dyn std::fmt::Display) {
        self.publish(LogEvent {
            level: Level::Fatal,
            message,
            fields: vec![("error", err.to_string())],
        });
        std::future::pending::<()>().await;
    }

    pub fn request(&self, summary: RequestSummary) {
        self.publish(LogEvent {
            level: Level::Info,
            message: "request handled",
            fields: vec![
                ("method", summary.method),
                ("uri", summary.uri),
                ("status", summary.status.to_string()),
                ("duration_ms", summary.duration.as_millis().to_string()),
                ("remote", summary.remote),
                ("transport", summary.transport.to_string()),
            ],
        });
    }
}

/// Spawns the single consumer task draining the channel into the `tracing`
/// sink in arrival order.
pub fn spawn_sink(mut rx: mpsc::UnboundedReceiver<LogEvent>, level: Level) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if level != Level::Disabled {
                emit(&event);
            }
            if event.level == Level::Fatal {
                // tracing's fmt writer is synchronous, so the event is on
                // the wire by the time emit returns.
                std::process::exit(1);
            }
        }
    })
}

fn emit(event: &LogEvent) {
    let fields = render_fields(&event.fields);
    match event.level {
        Level::Debug => tracing::debug!("{}{}", event.message, fields),
        Level::Info => tracing::info!("{}{}", event.message, fields),
        Level::Warning => tracing::warn!("{}{}", event.message, fields),
        Level::Error | Level::Fatal => tracing::error!("{}{}", event.message, fields),
        Level::Disabled => {}
    }
}

fn render_fields(fields: &[(&'static str, String)]) -> String {
    let mut out = String::new();
    for (key, value) in fields {
        out.push(' ');
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out
}
