//! Error types for Cadence

use thiserror::Error;

/// Core Cadence errors
#[derive(Error, Debug)]
pub enum CadenceError {
    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unknown message tag: {0:#04x}")]
    UnknownMessageTag(u8),

    #[error("Body too large: {size} > {max}")]
    BodyTooLarge { size: usize, max: usize },

    #[error("JSON error: {0}")]
    Json(String),

    // Payload errors
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // Log errors
    #[error("Sequence numbers exhausted for site {0}")]
    SequenceExhausted(crate::SiteId),

    #[error("Site {0} uses the reserved identifier")]
    ReservedSite(crate::SiteId),

    // Protocol errors
    #[error("Protocol violation: {role} role received {message} while {state}")]
    ProtocolViolation {
        role: &'static str,
        state: &'static str,
        message: &'static str,
    },

    // Link errors
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Timed out")]
    Timeout,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for Cadence operations
pub type CadenceResult<T> = Result<T, CadenceError>;
