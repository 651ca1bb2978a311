//! Error types for chime-core operations.

use std::path::PathBuf;

/// Errors surfaced by chime-core itself. Collaborator failures (lookups,
/// dispatch sinks) carry their own types and are recovered locally; these
/// are the conditions a caller can actually act on.
#[derive(Debug, thiserror::Error)]
pub enum ChimeError {
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using ChimeError.
pub type Result<T> = std::result::Result<T, ChimeError>;
