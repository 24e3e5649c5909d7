//! Error types for launch-string resolution and fingerprinting.

use thiserror::Error;

/// Reasons a launch string could not be turned into an executable path.
///
/// None of these abort an enumeration: the normalizer records them next to a
/// best-effort result so callers can tell a fallback from a real resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A quote was opened and never closed.
    #[error("malformed quoting: unterminated quote")]
    MalformedQuoting,

    /// No candidate resolved to an executable on the search path.
    #[error("executable not found: {0}")]
    ExecutableNotFound(String),

    /// The launch string was empty or blank.
    #[error("empty launch string")]
    EmptyLaunchString,
}

/// Errors produced while hashing an image.
#[derive(Error, Debug)]
pub enum FingerprintError {
    /// The file could not be opened or read.
    #[error("unreadable file '{path}': {source}")]
    UnreadableFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;
