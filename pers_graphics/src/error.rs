//! Error types for the pers graphics layer
//!
//! This module defines the error kinds surfaced by the buffer subsystem and the
//! device interfaces, together with the `pers_err!` / `pers_bail!` macros that log
//! an error at ERROR severity before handing it back to the caller.

use std::fmt;

/// Result type for pers graphics operations
pub type Result<T> = std::result::Result<T, Error>;

/// pers graphics errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (wgpu, mock, ...)
    BackendError(String),

    /// Invalid resource (buffer in the wrong mode, foreign buffer type, ...)
    InvalidResource(String),

    /// Initialization failed (instance, adapter, device)
    InitializationFailed(String),

    /// Buffer descriptor rejected by validation
    InvalidDescriptor(String),

    /// The logical device backing a factory is gone
    DeviceMissing(String),

    /// Offset or size outside of a buffer or mapping
    OutOfBounds(String),

    /// Buffer already mapped or a map is pending
    MapContention(String),

    /// Backend failed to map a buffer
    MapFailure(String),

    /// Operation on a destroyed buffer
    UseAfterDestroy(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidDescriptor(msg) => write!(f, "Invalid descriptor: {}", msg),
            Error::DeviceMissing(msg) => write!(f, "Device missing: {}", msg),
            Error::OutOfBounds(msg) => write!(f, "Out of bounds: {}", msg),
            Error::MapContention(msg) => write!(f, "Map contention: {}", msg),
            Error::MapFailure(msg) => write!(f, "Map failure: {}", msg),
            Error::UseAfterDestroy(msg) => write!(f, "Use after destroy: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR (with file:line) and build the matching `Error` variant
///
/// # Example
///
/// ```no_run
/// # use pers_graphics::pers_err;
/// let size = 0u64;
/// let err = pers_err!(InvalidDescriptor, "pers::BufferFactory", "invalid size {}", size);
/// ```
#[macro_export]
macro_rules! pers_err {
    ($kind:ident, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::pers_error!($source, "{}", message);
        $crate::pers::Error::$kind(message)
    }};
}

/// Log an ERROR (with file:line) and return `Err` from the enclosing function
///
/// # Example
///
/// ```no_run
/// # use pers_graphics::{pers_bail, pers::Result};
/// fn check(offset: u64, size: u64) -> Result<()> {
///     if offset > size {
///         pers_bail!(OutOfBounds, "pers::Example", "offset {} past {}", offset, size);
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! pers_bail {
    ($kind:ident, $source:expr, $($arg:tt)*) => {
        return Err($crate::pers_err!($kind, $source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
