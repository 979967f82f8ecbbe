//! Transport layer for Pairplay.
//!
//! Provides the [`Transport`] and [`Connection`] traits the gateway is
//! written against, the [`ConnectionId`] every other layer uses to name a
//! socket, and [`ConnectRequest`], the upgrade request metadata (path and
//! query string) captured when a connection is accepted.
//!
//! The path decides which connection class a socket belongs to (display
//! or controller) and the query carries the optional bearer token, so both
//! must survive the WebSocket handshake.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Allocated from a process-wide counter when a socket is accepted and
/// never reused, so it is safe to use as the identity of a host, a seat
/// occupant, or a paired controller for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The HTTP upgrade request a connection was opened with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Request path, e.g. `/game` or `/mobile`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
}

impl ConnectRequest {
    /// Builds a request from a path and optional query string.
    pub fn new(path: impl Into<String>, query: Option<String>) -> Self {
        Self {
            path: path.into(),
            query,
        }
    }

    /// Returns the first value of the query parameter `name`, if present.
    ///
    /// Values are returned verbatim; bearer tokens are URL-safe so no
    /// percent-decoding is attempted.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .as_deref()?
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }
}

/// One inbound frame, as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload of a text or binary frame.
    Data(Vec<u8>),
    /// A ping or pong from the peer. Carries no request, but proves the
    /// peer is still there.
    Heartbeat,
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next connection and completes its upgrade.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive frames.
///
/// Sending and receiving must not block each other: the gateway reads
/// requests on one task while room broadcasts are written from another.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends a text frame. Every server frame is JSON text.
    async fn send_text(&self, text: &str) -> Result<(), Self::Error>;

    /// Receives the next frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the socket.
    async fn recv(&self) -> Result<Option<Frame>, Self::Error>;

    /// Sends a ping. A live peer answers with a pong, which `recv`
    /// reports as [`Frame::Heartbeat`].
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the upgrade request this connection was opened with.
    fn request(&self) -> &ConnectRequest;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "host");
        map.insert(ConnectionId::new(2), "controller");
        assert_eq!(map[&ConnectionId::new(1)], "host");
    }

    #[test]
    fn test_query_param_finds_token() {
        let req = ConnectRequest::new("/game", Some("EIO=4&token=a.b.c".into()));
        assert_eq!(req.query_param("token"), Some("a.b.c"));
        assert_eq!(req.query_param("EIO"), Some("4"));
    }

    #[test]
    fn test_query_param_missing_or_empty_is_none() {
        let req = ConnectRequest::new("/game", Some("token=&flag".into()));
        assert_eq!(req.query_param("token"), None);
        assert_eq!(req.query_param("flag"), None);
        assert_eq!(req.query_param("other"), None);

        let bare = ConnectRequest::new("/mobile", None);
        assert_eq!(bare.query_param("token"), None);
    }
}
