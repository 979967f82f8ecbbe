//! Error types for the room layer.
//!
//! The `Display` string of every variant is what the requesting client
//! sees in the `error` field of its failed acknowledgement, so the
//! wording is written for people, not logs.

use std::fmt;

use pairplay_protocol::ProtocolError;
use pairplay_session::SessionError;

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// No live room with that id or PIN.
    Room,
    /// The requester has no seat in the room.
    Seat,
    /// No live seat carries that pairing code.
    PairingCode,
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room => f.write_str("Room not found"),
            Self::Seat => f.write_str("Player not found in room"),
            Self::PairingCode => f.write_str("Invalid device code or player not found"),
        }
    }
}

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room, seat, or pairing code does not exist (any more).
    #[error("{0}")]
    NotFound(Lookup),

    /// Every seat in the room is taken.
    #[error("Room is full")]
    Full,

    /// A non-host tried a host-only action.
    #[error("Only the host can {0}")]
    Forbidden(&'static str),

    /// The action is allowed but its precondition doesn't hold yet,
    /// e.g. starting while a seat is not ready.
    #[error("{0}")]
    Precondition(&'static str),

    /// The request is missing a field or carries an unusable value.
    #[error("Malformed request: {0}")]
    Malformed(String),

    /// The room is in a phase that doesn't allow this operation.
    #[error("{0}")]
    InvalidState(String),

    /// No free code is left to allocate.
    #[error("No free {0} available, try again later")]
    ResourceExhausted(&'static str),

    /// The coordinator task has stopped.
    #[error("Room service unavailable")]
    Unavailable,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
