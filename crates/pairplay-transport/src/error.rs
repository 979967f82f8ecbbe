use crate::ConnectionId;

/// Errors raised by the socket layer.
///
/// None of these reach a client: the gateway logs them and drops the
/// connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The HTTP upgrade was rejected or malformed.
    #[error("WebSocket upgrade failed: {0}")]
    Upgrade(String),

    /// Writing a frame failed; the peer is usually gone.
    #[error("send to {connection} failed: {reason}")]
    Send {
        connection: ConnectionId,
        reason: String,
    },

    #[error("receive from {connection} failed: {reason}")]
    Receive {
        connection: ConnectionId,
        reason: String,
    },
}
