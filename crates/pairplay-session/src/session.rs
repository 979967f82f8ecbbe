//! Session types: the server's record of one live socket.

use std::fmt;
use std::time::Instant;

use pairplay_protocol::ConnectionId;

use crate::Identity;

// ---------------------------------------------------------------------------
// ConnectionClass
// ---------------------------------------------------------------------------

/// Which side of the game a connection is on.
///
/// The class is fixed by the upgrade path and decides which requests the
/// connection may send:
///
/// ```text
///   /game    → Display     (shared screen: hosts rooms, takes seats)
///   /mobile  → Controller  (phone: finds a room, pairs to a seat)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionClass {
    Display,
    Controller,
}

impl ConnectionClass {
    /// Picks the class for an upgrade path, ignoring a trailing slash.
    ///
    /// Returns `None` for any path that is not a Pairplay endpoint.
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/game" => Some(Self::Display),
            "/mobile" => Some(Self::Controller),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display => f.write_str("display"),
            Self::Controller => f.write_str("controller"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single connection's session.
///
/// Created when the socket is accepted and dropped when it closes. There
/// is no reconnection: a new socket is a new session.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub class: ConnectionClass,
    /// Cosmetic identity resolved from the connect token.
    pub identity: Identity,
    pub connected_at: Instant,
}

impl Session {
    pub fn new(connection_id: ConnectionId, class: ConnectionClass, identity: Identity) -> Self {
        Self {
            connection_id,
            class,
            identity,
            connected_at: Instant::now(),
        }
    }

    /// The display-name hint, if the connection carried one.
    pub fn username(&self) -> Option<&str> {
        self.identity.display_name.as_deref()
    }
}
