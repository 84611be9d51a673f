//! Logging system initialization
//!
//! Sets up tracing with an EnvFilter level, optional file output via a
//! non-blocking appender, and plain or JSON formatting.

use tracing_appender::non_blocking::WorkerGuard;

use crate::config::LoggingConfig;

/// Result of logging initialization
pub struct LoggingInitResult {
    /// Worker guard that must be kept alive for the duration of the program
    pub guard: WorkerGuard,
    /// Warning if file logging failed and output fell back to stdout
    pub warning: Option<String>,
}

/// Initialize the logging system, once, at startup.
pub fn init_logging(config: &LoggingConfig) -> LoggingInitResult {
    let (writer, warning): (Box<dyn std::io::Write + Send + Sync>, Option<String>) =
        match config.file.as_deref().filter(|f| !f.is_empty()) {
            Some(log_file) => match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
            {
                Ok(file) => (Box::new(file), None),
                Err(e) => (
                    Box::new(std::io::stdout()),
                    Some(format!(
                        "Failed to open log file '{}': {}. Falling back to stdout.",
                        log_file, e
                    )),
                ),
            },
            None => (Box::new(std::io::stdout()), None),
        };

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(writer);
    let filter = tracing_subscriber::EnvFilter::new(config.level.clone());

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(non_blocking_writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(config.file.as_ref().is_none_or(|f| f.is_empty()));

    if config.format == "json" {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }

    LoggingInitResult { guard, warning }
}
