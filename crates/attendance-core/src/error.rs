use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the attendance report pipeline.
#[derive(Error, Debug)]
pub enum AttendanceError {
    /// An export or roster file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An export file is missing its meeting metadata or carries values that
    /// cannot be parsed. Fatal for that file only; the run continues.
    #[error("Malformed export {path}: {reason}")]
    MalformedExport { path: PathBuf, reason: String },

    /// A start-time string did not match the expected locale format.
    #[error("Invalid start time: {0}")]
    TimestampParse(String),

    /// A roster file could not be interpreted. Fatal at startup.
    #[error("Invalid roster file {path}: {reason}")]
    Roster { path: PathBuf, reason: String },

    /// A configuration value is missing or invalid. Fatal at startup,
    /// before any file is processed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for CSV-level read errors.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the attendance crates.
pub type Result<T> = std::result::Result<T, AttendanceError>;
