//! Error types for tracker-core operations.
//!
//! Only `TrackerError` is ever fatal, and only at startup. Monitor and calendar
//! errors are absorbed by the recorder inside a single tick.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Startup Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors that stop the tracker from starting.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    // ─────────────────────────────────────────────────────────────────────
    // Credential Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Calendar credentials unusable: {0}")]
    Credentials(String),
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Per-tick Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// The process table could not be read for this tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorError {
    #[error("Process table unavailable: {0}")]
    Unavailable(String),
}

/// A calendar write did not produce an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar authorization failed: {0}")]
    Auth(String),

    #[error("Calendar request failed: {0}")]
    Network(String),

    #[error("Calendar rejected event (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Calendar response malformed: {0}")]
    Malformed(String),
}

impl From<TrackerError> for String {
    fn from(err: TrackerError) -> String {
        err.to_string()
    }
}
