//! Error types for the AT command layer.

use thiserror::Error;

/// Errors that can occur while building, scheduling or executing AT commands.
///
/// The variants follow the status-code taxonomy used by the modem drivers:
/// every fallible call returns one of these instead of panicking.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AtError {
    /// Generic failure, usually "the device reported ERROR".
    #[error("command failed")]
    Fail,

    /// The scheduler or a wake/sleep sequence is already in progress.
    #[error("busy")]
    Busy,

    /// Null, empty or malformed argument, or a command that would overflow its buffer.
    #[error("invalid parameter")]
    InvalidParameter,

    /// Used before `init`.
    #[error("not initialized")]
    NotInitialized,

    /// No terminating response within the command's window.
    #[error("timeout waiting for response")]
    Timeout,

    /// A required output object was missing.
    #[error("allocation failed")]
    AllocationFailed,

    /// The command queue has no free slot.
    #[error("command queue is full")]
    QueueFull,

    /// Response data did not fit in the output buffer.
    #[error("buffer overflow: max {max} bytes, got {actual}")]
    BufferOverflow { max: usize, actual: usize },

    /// The UART or a GPIO reported an error.
    #[error("transport i/o error")]
    Io,
}

/// Result type alias for AT operations.
pub type AtResult<T> = Result<T, AtError>;
