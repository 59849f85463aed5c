use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why the accelerated surface is not available.
///
/// The `Display` text is what the fallback view shows to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// No accelerated context could be obtained at any tier.
    #[error("3D mode unavailable: {0}")]
    DetectionFailure(String),
    /// The probe succeeded but the mounted surface failed to initialize.
    #[error("3D surface failed to initialize: {0}")]
    CreationFailure(String),
    /// The host revoked a live context.
    #[error("the graphics context was lost; retry to restore 3D mode")]
    ContextLost,
    /// The surface never confirmed creation within the configured window.
    #[error("3D surface did not become ready within {0:?}")]
    ReadyTimeout(Duration),
}

/// Errors from the host event-loop runner.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] calloop::Error),
    #[error("failed to register event source: {0}")]
    Source(String),
}

/// Raw error codes reported by a graphics context, decoded for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextErrorCode {
    NoError,
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    OutOfMemory,
    ContextLost,
    Unknown(u32),
}

impl ContextErrorCode {
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => Self::NoError,
            0x0500 => Self::InvalidEnum,
            0x0501 => Self::InvalidValue,
            0x0502 => Self::InvalidOperation,
            0x0505 => Self::OutOfMemory,
            0x9242 => Self::ContextLost,
            other => Self::Unknown(other),
        }
    }

    /// Human-readable description, or `None` when there is no error.
    pub fn describe(&self) -> Option<String> {
        let text = match self {
            Self::NoError => return None,
            Self::InvalidEnum => "Invalid enum".to_string(),
            Self::InvalidValue => "Invalid value".to_string(),
            Self::InvalidOperation => "Invalid operation".to_string(),
            Self::OutOfMemory => "Out of memory".to_string(),
            Self::ContextLost => "Context lost".to_string(),
            Self::Unknown(code) => format!("Unknown error: {code}"),
        };
        Some(text)
    }
}

impl fmt::Display for ContextErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe() {
            Some(text) => f.write_str(&text),
            None => f.write_str("No error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_human_readable() {
        let err = GateError::DetectionFailure("no adapter".into());
        assert_eq!(err.to_string(), "3D mode unavailable: no adapter");
        assert!(!GateError::ContextLost.to_string().is_empty());
    }

    #[test]
    fn test_decode_known_codes() {
        assert_eq!(ContextErrorCode::from_raw(0), ContextErrorCode::NoError);
        assert_eq!(ContextErrorCode::from_raw(0x0505), ContextErrorCode::OutOfMemory);
        assert_eq!(ContextErrorCode::from_raw(0x9242), ContextErrorCode::ContextLost);
        assert_eq!(ContextErrorCode::NoError.describe(), None);
    }

    #[test]
    fn test_unknown_code_keeps_value() {
        let code = ContextErrorCode::from_raw(1234);
        assert_eq!(code.describe().as_deref(), Some("Unknown error: 1234"));
    }
}
