//! Error types for PagePitch.
//!
//! Library crates use [`PagePitchError`] via `thiserror` for conditions that
//! abort a run (bad configuration, unreadable lead source, unresolvable
//! schema). Per-record failures are reported through each component's own
//! failure type instead. The CLI wraps this with `color-eyre`.

use std::path::PathBuf;

/// Top-level error type for fatal PagePitch operations.
#[derive(Debug, thiserror::Error)]
pub enum PagePitchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP client setup error.
    #[error("network error: {0}")]
    Network(String),

    /// The tabular lead source could not be opened or read.
    #[error("ingest error: {message}")]
    Ingest { message: String },

    /// The lead source lacks one or more of the required columns.
    #[error("Could not find required columns: {}. Found columns: {found:?}", missing.join(", "))]
    MissingColumns {
        missing: Vec<&'static str>,
        found: Vec<String>,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagePitchError>;

impl PagePitchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an ingest error from any displayable message.
    pub fn ingest(msg: impl Into<String>) -> Self {
        Self::Ingest {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
