//! Unified error type for the Pairplay server.

use pairplay_protocol::ProtocolError;
use pairplay_room::RoomError;
use pairplay_session::SessionError;
use pairplay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each layer's variant generates the `From`
/// impl, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PairplayError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room operation failed, or the coordinator is gone.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// An environment variable held an unusable value.
    #[error("invalid {key} value {value:?}: {reason}")]
    Config {
        key: &'static str,
        value: String,
        reason: String,
    },
}
