//! Room configuration and the per-room phase machine.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RepairPolicy
// ---------------------------------------------------------------------------

/// What happens when a controller pairs with a seat that already has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairPolicy {
    /// The new controller takes the seat; the old one silently loses it.
    #[default]
    Transfer,
    /// The pairing is refused while the seat is bound.
    Reject,
}

impl FromStr for RepairPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transfer" => Ok(Self::Transfer),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown repair policy {other:?} (expected transfer or reject)")),
        }
    }
}

impl fmt::Display for RepairPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => f.write_str("transfer"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room the coordinator manages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Seat limit for rooms created without an explicit one.
    pub default_max_seats: usize,

    /// Time between `game_countdown` and `game_start`.
    pub countdown: Duration,

    /// Fraction of a code space that may be live before allocation fails
    /// with `ResourceExhausted`.
    pub saturation_ratio: f64,

    /// How a second pairing against a bound seat is handled.
    pub repair_policy: RepairPolicy,

    /// Game type announced when `start_game` doesn't name one.
    pub default_game_type: String,

    /// Capacity of the coordinator's command channel.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_max_seats: 4,
            countdown: Duration::from_millis(3000),
            saturation_ratio: 0.8,
            repair_policy: RepairPolicy::Transfer,
            default_game_type: "simple-example".to_string(),
            command_buffer: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a room is in its round.
///
/// ```text
/// Waiting ──(start_game)──→ Countdown ──(timer fires)──→ Started
/// ```
///
/// - **Waiting**: seats may be taken and readied.
/// - **Countdown**: the start has been announced; the roster is frozen.
/// - **Started**: the round is running. Terminal for this room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Waiting,
    Countdown,
    Started,
}

impl RoomPhase {
    /// Returns `true` if seats may still be joined or readied.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Countdown => write!(f, "Countdown"),
            Self::Started => write!(f, "Started"),
        }
    }
}
