//! Identifier and snapshot types shared by every Pairplay layer.
//!
//! Rooms are named three ways on the wire:
//!
//! - a [`RoomId`]: opaque, process-unique, never reused. Also used as the
//!   broadcast channel name for the room.
//! - a [`Pin`]: the 4-digit code a person types on a phone to find a room.
//! - a [`PairingCode`]: the 3-digit code shown on a seat, used by a
//!   controller to bind itself to that seat.
//!
//! PINs and pairing codes are only unique among *live* rooms and seats, so
//! they are never used as a durable identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// Opaque identifier for a room.
///
/// `#[serde(transparent)]` keeps it a plain JSON string, so
/// `RoomId("room_1_ab12")` travels as `"room_1_ab12"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps an already-formatted room id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the id as a string slice (e.g. to use it as a channel name).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Short numeric codes
// ---------------------------------------------------------------------------

/// Checks that `raw` (after trimming) is exactly `width` ASCII digits.
fn parse_digits(raw: &str, width: usize, what: &str) -> Result<String, ProtocolError> {
    let trimmed = raw.trim();
    if trimmed.len() == width && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        Ok(trimmed.to_string())
    } else {
        Err(ProtocolError::InvalidMessage(format!(
            "{what} must be {width} digits, got {raw:?}"
        )))
    }
}

/// A 4-digit room PIN, e.g. `"4821"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Pin(String);

impl Pin {
    /// Number of digits in a PIN.
    pub const WIDTH: usize = 4;

    /// Parses user input into a PIN.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` unless the trimmed input is
    /// exactly four ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        parse_digits(raw, Self::WIDTH, "PIN").map(Self)
    }

    /// Formats an allocated number as a PIN.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` if `n` does not print as four
    /// digits.
    pub fn from_number(n: u32) -> Result<Self, ProtocolError> {
        Self::parse(&n.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 3-digit seat pairing code, e.g. `"317"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PairingCode(String);

impl PairingCode {
    /// Number of digits in a pairing code.
    pub const WIDTH: usize = 3;

    /// Parses user input into a pairing code.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` unless the trimmed input is
    /// exactly three ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        parse_digits(raw, Self::WIDTH, "pairing code").map(Self)
    }

    /// Formats an allocated number as a pairing code.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` if `n` does not print as
    /// three digits.
    pub fn from_number(n: u32) -> Result<Self, ProtocolError> {
        Self::parse(&n.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Room snapshot
// ---------------------------------------------------------------------------

/// One seat as displays see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// The occupant's connection id, rendered as a string.
    pub id: String,
    pub seat_number: u32,
    pub pairing_code: PairingCode,
    /// True while a controller is paired to this seat.
    pub is_connected: bool,
    /// True only in the copy of the snapshot sent to this seat's occupant.
    pub is_current_player: bool,
    pub username: String,
    pub ready: bool,
}

/// The roster of a room, sent on every membership change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub room_name: String,
    pub players: Vec<PlayerView>,
}

impl RoomSnapshot {
    /// Returns a copy with `is_current_player` set for the seat occupied by
    /// `viewer` and cleared everywhere else.
    pub fn viewed_by(&self, viewer: &str) -> Self {
        let mut snapshot = self.clone();
        for player in &mut snapshot.players {
            player.is_current_player = player.id == viewer;
        }
        snapshot
    }
}
