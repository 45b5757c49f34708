//! # Primitives
//!
//! Fixed runtime constants for the ipscout engine: file naming, timestamp
//! formats and default locations.

use chrono::Local;

/// Timestamp format for every line written to a log file.
///
/// `[<YYYY-MM-DD HH:MM:SS>] [<module name>] <message line>`
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format embedded in log file names.
///
/// Uses dashes only so the timestamp survives as a single token in
/// `<safe_target>_<timestamp>.log`.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Edge timestamp format (ISO-8601, local time, microseconds).
pub const EDGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Extension of per-target and session log files.
pub const LOG_EXTENSION: &str = "log";

/// Extension of save records.
pub const SAVE_EXTENSION: &str = "save";

/// File name prefix of the rolling session log.
pub const SESSION_LOG_PREFIX: &str = "session";

/// Tag used for graph audit-trail lines in the session log.
pub const GRAPH_LOG_TAG: &str = "graph";

/// Default log directory (relative to the working directory).
pub const DEFAULT_LOG_DIR: &str = "log";

/// Default save directory (relative to the working directory).
pub const DEFAULT_SAVE_DIR: &str = "saves";

/// Default output file for `exportgraph`.
pub const DEFAULT_GRAPH_FILE: &str = "session_graph.dot";

/// Current local time formatted for log lines.
#[must_use]
pub fn log_timestamp() -> String {
    Local::now().format(LOG_TIMESTAMP_FORMAT).to_string()
}

/// Current local time formatted for file names.
#[must_use]
pub fn file_timestamp() -> String {
    Local::now().format(FILE_TIMESTAMP_FORMAT).to_string()
}

/// Current local time as an ISO-8601 edge timestamp.
#[must_use]
pub fn edge_timestamp() -> String {
    Local::now().format(EDGE_TIMESTAMP_FORMAT).to_string()
}
