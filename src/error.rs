//! Error types for the Myo protocol core.
//!
//! | Error | Raised by | Meaning |
//! |---|---|---|
//! | [`ValidationError`] | [`crate::command`] constructors | bad command input, rejected before any I/O |
//! | [`DecodeError`] | [`crate::parse`] | wrong payload length or unknown enum value |
//! | [`PreconditionError`] | [`crate::session::Session`] | operation invoked in the wrong state |
//! | [`TransportError`] | [`crate::transport::Transport`] implementations | BLE stack failure |
//!
//! [`MyoError`] wraps all of them for the session-level API.

use thiserror::Error;

use crate::session::SessionState;

/// Rejected command construction input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("RGB colour must have exactly 3 components, got {0}")]
    RgbLength(usize),

    #[error("RGB component {value} is outside 0..=255")]
    RgbComponent { value: i64 },

    #[error("vibration duration {millis} ms does not fit in 16 bits")]
    VibrationDuration { millis: u128 },
}

/// A notification or read payload that could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid {kind} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown {kind} value: 0x{value:X}")]
    UnknownEnumValue { kind: &'static str, value: u32 },
}

/// An operation was invoked while the session was in the wrong state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("not connected to a Myo device")]
    NotConnected,

    #[error("modes have not been configured; call setup() first")]
    NotConfigured,

    #[error("no device discovered; call discover() first")]
    NoDevice,

    #[error("cannot {op} while session is {state:?}")]
    InvalidState {
        op: &'static str,
        state: SessionState,
    },
}

/// Failure reported by the BLE transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("characteristic for handle 0x{0:04X} not found on device")]
    CharacteristicNotFound(u16),

    #[error("handle 0x{0:04X} is not part of the Myo GATT profile")]
    UnknownHandle(u16),

    #[cfg(feature = "ble")]
    #[error("BLE error: {0}")]
    Backend(#[from] btleplug::Error),

    #[error("{0}")]
    Other(String),
}

/// Umbrella error returned by [`crate::session::Session`] operations.
#[derive(Error, Debug)]
pub enum MyoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no Myo device matched {0}")]
    DeviceNotFound(String),

    #[error("could not connect to {device}: {source}")]
    ConnectionFailed {
        device: String,
        #[source]
        source: TransportError,
    },
}

pub type Result<T, E = MyoError> = std::result::Result<T, E>;
