//! Error types for the session layer.

use pairplay_protocol::ConnectionId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The bearer token could not be read as `header.payload.signature`
    /// with a base64 JSON payload.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// No session exists for the given connection.
    #[error("session not found for {0}")]
    NotFound(ConnectionId),

    /// A session was registered twice for the same connection.
    #[error("{0} already has a session")]
    AlreadyRegistered(ConnectionId),

    /// Only display connections may join broadcast channels; controllers
    /// are always addressed one at a time.
    #[error("{0} is a controller and cannot join channels")]
    NotSubscribable(ConnectionId),
}
