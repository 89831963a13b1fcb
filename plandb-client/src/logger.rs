//! Logging Infrastructure
//!
//! Embedding applications may install their own subscriber; these helpers
//! cover the common case. `RUST_LOG` overrides the given level.

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Log file prefix inside the log directory
pub const LOG_FILE_PREFIX: &str = "plandb-client";

/// Initialize the logger
pub fn init_logger() -> bool {
    init_logger_with_file(None, false, None)
}

/// Initialize the logger with optional JSON formatting and daily rolling file output
///
/// Returns false when a global subscriber was already installed.
pub fn init_logger_with_file(log_level: Option<&str>, json: bool, log_dir: Option<&Path>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.unwrap_or("info")));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    // Add file output if log_dir exists
    let file_appender = log_dir
        .filter(|dir| dir.is_dir())
        .map(|dir| tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));

    let result = match (json, file_appender) {
        (true, Some(writer)) => builder.json().with_writer(writer).try_init(),
        (true, None) => builder.json().try_init(),
        (false, Some(writer)) => builder.with_writer(writer).try_init(),
        (false, None) => builder.try_init(),
    };
    result.is_ok()
}
