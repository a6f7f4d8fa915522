//! Error types for sfxkit

use std::fmt;

use crate::exit_codes::{
    EXIT_BUILD_ERROR, EXIT_ERROR, EXIT_FORMAT_ERROR, EXIT_INTEGRATION_ERROR, EXIT_IO_ERROR,
    EXIT_SAFETY_GUARD_ERROR,
};

/// Reasons an embedded archive cannot be located or decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// File is shorter than the trailer itself
    TooSmall,

    /// Last 8 bytes are not the magic constant
    MagicMismatch,

    /// Decoded archive length is zero or larger than the file
    InvalidLength(u64),

    /// Archive would start before the beginning of the file
    InvalidStart,

    /// Archive blob is present but cannot be decoded
    Archive(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::TooSmall => write!(f, "file too small to carry a trailer"),
            FormatError::MagicMismatch => write!(f, "trailer magic mismatch"),
            FormatError::InvalidLength(len) => write!(f, "invalid archive length {len}"),
            FormatError::InvalidStart => write!(f, "invalid archive start offset"),
            FormatError::Archive(msg) => write!(f, "corrupt archive: {msg}"),
        }
    }
}

/// Main error type for sfxkit operations
#[derive(Debug)]
pub enum SfxError {
    /// Corrupt or truncated trailer/archive
    Format(FormatError),

    /// IO error on stub, payload or install files
    Io(std::io::Error),

    /// Cleanup refused to touch an unintended path
    SafetyGuard(String),

    /// Shortcut or registration failure
    PlatformIntegration(String),

    /// Deferred self-delete could not be scheduled
    SelfDeleteScheduling(String),

    /// JSON encoding error
    Json(serde_json::Error),

    /// Packaging error
    Build(String),

    /// Generic error with message
    Generic(String),
}

impl SfxError {
    /// Map the error to a process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            SfxError::Format(_) => EXIT_FORMAT_ERROR,
            SfxError::Io(_) => EXIT_IO_ERROR,
            SfxError::SafetyGuard(_) => EXIT_SAFETY_GUARD_ERROR,
            SfxError::PlatformIntegration(_) | SfxError::SelfDeleteScheduling(_) => {
                EXIT_INTEGRATION_ERROR
            }
            SfxError::Json(_) | SfxError::Build(_) => EXIT_BUILD_ERROR,
            SfxError::Generic(_) => EXIT_ERROR,
        }
    }

    /// True for the typed trailer/archive failures
    pub fn is_format(&self) -> bool {
        matches!(self, SfxError::Format(_))
    }
}

impl fmt::Display for SfxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SfxError::Format(err) => write!(f, "Format error: {err}"),
            SfxError::Io(err) => write!(f, "IO error: {err}"),
            SfxError::SafetyGuard(msg) => write!(f, "Safety guard: {msg}"),
            SfxError::PlatformIntegration(msg) => write!(f, "Platform integration error: {msg}"),
            SfxError::SelfDeleteScheduling(msg) => {
                write!(f, "Self-delete scheduling error: {msg}")
            }
            SfxError::Json(err) => write!(f, "JSON error: {err}"),
            SfxError::Build(msg) => write!(f, "Build error: {msg}"),
            SfxError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SfxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SfxError::Io(err) => Some(err),
            SfxError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FormatError> for SfxError {
    fn from(err: FormatError) -> Self {
        SfxError::Format(err)
    }
}

impl From<std::io::Error> for SfxError {
    fn from(err: std::io::Error) -> Self {
        SfxError::Io(err)
    }
}

impl From<serde_json::Error> for SfxError {
    fn from(err: serde_json::Error) -> Self {
        SfxError::Json(err)
    }
}

impl From<anyhow::Error> for SfxError {
    fn from(err: anyhow::Error) -> Self {
        SfxError::Generic(err.to_string())
    }
}

/// Result type for sfxkit operations
pub type Result<T> = std::result::Result<T, SfxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display() {
        let err = SfxError::from(FormatError::InvalidLength(0));
        assert!(err.is_format());
        assert_eq!(err.to_string(), "Format error: invalid archive length 0");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            SfxError::SafetyGuard("root".into()).exit_code(),
            EXIT_SAFETY_GUARD_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(SfxError::from(io).exit_code(), EXIT_IO_ERROR);
    }
}
