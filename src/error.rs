//! Crate error type
//!
//! The simulation itself never fails; only the edges that touch the outside
//! world (tuning files, score storage) return these.

use std::fmt;

/// Errors from configuration loading and persistence
#[derive(Debug)]
pub enum Error {
    /// Filesystem failure
    Io(std::io::Error),
    /// Malformed JSON
    Json(serde_json::Error),
    /// Save envelope written by a newer build
    UnsupportedVersion { found: u32, supported: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::Json(e) => write!(f, "invalid json: {e}"),
            Self::UnsupportedVersion { found, supported } => {
                write!(f, "unsupported save version {found} (supports up to {supported})")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::UnsupportedVersion { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
