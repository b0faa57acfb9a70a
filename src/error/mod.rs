// Error types for the audio echo engine
//
// This module defines the engine's error taxonomy, providing structured error
// handling with numeric codes suitable for reporting across the JNI boundary.

mod echo;

pub use echo::{log_echo_error, EchoError, EchoErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the native boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
