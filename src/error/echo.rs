// Echo engine error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Echo engine error code constants
///
/// Single source of truth for the codes surfaced to the UI collaborator.
///
/// Error code range: 2001-2006
pub struct EchoErrorCodes;

impl EchoErrorCodes {
    /// Platform audio object could not be opened
    pub const DEVICE_UNAVAILABLE: i32 = 2001;

    /// Requested rate/channels/buffer size rejected
    pub const UNSUPPORTED_FORMAT: i32 = 2002;

    /// Capture requested without a prior permission grant
    pub const PERMISSION_DENIED: i32 = 2003;

    /// Queue or buffer allocation failed
    pub const ALLOCATION_FAILURE: i32 = 2004;

    /// Operation not permitted in the current lifecycle state
    pub const INVALID_STATE: i32 = 2005;

    /// An opened stream failed to start or stop
    pub const STREAM_FAILURE: i32 = 2006;
}

/// Log an echo engine error with structured context
///
/// Logs the numeric code, the component and the human-readable message.
/// Never call this from a real-time callback.
pub fn log_echo_error(err: &EchoError, context: &str) {
    error!(
        "Echo error in {}: code={}, component=EchoEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors reported synchronously by the lifecycle operations.
///
/// None of these is retried internally; retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoError {
    /// Platform audio object could not be opened
    DeviceUnavailable { reason: String },

    /// Requested rate/channels rejected by the hardware or by validation
    UnsupportedFormat { reason: String },

    /// Capture permission was not granted before creating the recorder
    PermissionDenied,

    /// Queue/buffer allocation failed
    AllocationFailure { reason: String },

    /// Operation invoked in a lifecycle state that does not permit it
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Stream opened but the platform refused to start or stop it
    StreamFailure { reason: String },
}

impl ErrorCode for EchoError {
    fn code(&self) -> i32 {
        match self {
            EchoError::DeviceUnavailable { .. } => EchoErrorCodes::DEVICE_UNAVAILABLE,
            EchoError::UnsupportedFormat { .. } => EchoErrorCodes::UNSUPPORTED_FORMAT,
            EchoError::PermissionDenied => EchoErrorCodes::PERMISSION_DENIED,
            EchoError::AllocationFailure { .. } => EchoErrorCodes::ALLOCATION_FAILURE,
            EchoError::InvalidState { .. } => EchoErrorCodes::INVALID_STATE,
            EchoError::StreamFailure { .. } => EchoErrorCodes::STREAM_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            EchoError::DeviceUnavailable { reason } => {
                format!("Audio device unavailable: {}", reason)
            }
            EchoError::UnsupportedFormat { reason } => {
                format!("Unsupported audio format: {}", reason)
            }
            EchoError::PermissionDenied => {
                "Record audio permission denied. Grant microphone access first.".to_string()
            }
            EchoError::AllocationFailure { reason } => {
                format!("Audio buffer allocation failed: {}", reason)
            }
            EchoError::InvalidState { operation, state } => {
                format!("{} is not valid in state {}", operation, state)
            }
            EchoError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for EchoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EchoError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for EchoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_error_codes() {
        assert_eq!(
            EchoError::DeviceUnavailable {
                reason: "test".to_string()
            }
            .code(),
            EchoErrorCodes::DEVICE_UNAVAILABLE
        );
        assert_eq!(
            EchoError::UnsupportedFormat {
                reason: "test".to_string()
            }
            .code(),
            EchoErrorCodes::UNSUPPORTED_FORMAT
        );
        assert_eq!(
            EchoError::PermissionDenied.code(),
            EchoErrorCodes::PERMISSION_DENIED
        );
        assert_eq!(
            EchoError::AllocationFailure {
                reason: "test".to_string()
            }
            .code(),
            EchoErrorCodes::ALLOCATION_FAILURE
        );
        assert_eq!(
            EchoError::InvalidState {
                operation: "start_echo",
                state: "Created"
            }
            .code(),
            EchoErrorCodes::INVALID_STATE
        );
        assert_eq!(
            EchoError::StreamFailure {
                reason: "test".to_string()
            }
            .code(),
            EchoErrorCodes::STREAM_FAILURE
        );
    }

    #[test]
    fn test_echo_error_messages() {
        let err = EchoError::InvalidState {
            operation: "start_echo",
            state: "Created",
        };
        assert_eq!(err.message(), "start_echo is not valid in state Created");

        let err = EchoError::PermissionDenied;
        assert!(err.message().contains("permission denied"));

        let err = EchoError::UnsupportedFormat {
            reason: "sample rate must be positive (got 0)".to_string(),
        };
        assert!(err.message().contains("got 0"));
    }

    #[test]
    fn test_echo_error_display() {
        let err = EchoError::PermissionDenied;
        let display = format!("{}", err);
        assert!(display.contains("EchoError"));
        assert!(display.contains("2003"));
    }
}
