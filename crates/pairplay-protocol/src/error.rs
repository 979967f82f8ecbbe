//! Error types for the protocol layer.
//!
//! Each crate in Pairplay defines its own error enum. A `ProtocolError`
//! always means a frame could not be turned into (or out of) a typed
//! message, never that a room operation failed.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into a frame).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning a frame into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown `event` tag, missing
    /// required fields, or wrong data types.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame decoded but a field violates a protocol rule, e.g. a PIN
    /// that is not four digits.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
