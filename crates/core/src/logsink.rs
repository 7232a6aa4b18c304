//! Leveled log-sink callback handed to the orchestrator by its caller.
//!
//! The sink is invoked synchronously, in event order. Callers that just want
//! console output can use [`tracing_sink`]; a GUI shell would install its own
//! callback instead.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Success,
}

pub type LogSink = Arc<dyn Fn(&str, LogLevel) + Send + Sync>;

/// Sink that forwards pipeline events to `tracing`.
pub fn tracing_sink() -> LogSink {
    Arc::new(|message, level| match level {
        LogLevel::Debug => tracing::debug!("{message}"),
        LogLevel::Info | LogLevel::Success => tracing::info!("{message}"),
        LogLevel::Warning => tracing::warn!("{message}"),
        LogLevel::Error => tracing::error!("{message}"),
    })
}

/// Sink that drops everything; handy in tests.
pub fn null_sink() -> LogSink {
    Arc::new(|_, _| {})
}
