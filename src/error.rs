//! Error types for the measurement firmware.
//!
//! All variants are `Copy` so they pass through the state machine and the
//! control surface without allocation.  Recoverable conditions (finger
//! lost, stall, cancellation) are not errors; they are [`AbortReason`]s
//! folded into a state transition.
//!
//! [`AbortReason`]: crate::session::AbortReason

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Startup failures surfaced to the binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Nothing answered at the sensor address, or the part id is wrong.
    NotFound,
    /// An I2C transaction failed.
    Bus,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "sensor not found"),
            Self::Bus => write!(f, "I2C transaction failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// Request line or headers could not be parsed.
    Malformed,
    /// Headers or body exceed the request buffer.
    TooLarge,
    /// Connection closed before the request was complete.
    Incomplete,
    /// The request did not arrive in full before the connection deadline.
    Timeout,
    /// No route for this path.
    NotFound,
    /// The path exists but not for this method.
    MethodNotAllowed,
}

impl HttpError {
    /// Status line sent back for this error.
    pub const fn status_line(self) -> &'static str {
        match self {
            Self::Malformed | Self::Incomplete => "400 Bad Request",
            Self::Timeout => "408 Request Timeout",
            Self::TooLarge => "413 Payload Too Large",
            Self::NotFound => "404 Not Found",
            Self::MethodNotAllowed => "405 Method Not Allowed",
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed request"),
            Self::TooLarge => write!(f, "request too large"),
            Self::Incomplete => write!(f, "truncated request"),
            Self::Timeout => write!(f, "request timed out"),
            Self::NotFound => write!(f, "no such endpoint"),
            Self::MethodNotAllowed => write!(f, "method not allowed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
