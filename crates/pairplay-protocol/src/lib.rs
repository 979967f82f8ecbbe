//! Wire protocol for Pairplay.
//!
//! This crate defines the "language" displays, controllers, and the
//! coordinator speak:
//!
//! - **Identifiers** ([`RoomId`], [`Pin`], [`PairingCode`], and the
//!   transport's [`ConnectionId`]).
//! - **Requests** ([`Request`], [`DisplayRequest`], [`ControllerRequest`]):
//!   what each connection class may send, with an optional `ack` id.
//! - **Events** ([`ServerEvent`], [`Ack`], [`RoomSnapshot`]): what the
//!   coordinator sends back, either as an acknowledgement or a broadcast.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are turned
//!   into text and back.
//!
//! # Frame shape
//!
//! Every frame is a JSON object tagged by `event`:
//!
//! ```text
//! → {"event":"join_room_by_pin","ack":3,"pin":"4821"}
//! ← {"event":"room_players_updated","roomId":"room_1_x8k2p0q","roomName":"Room 4821","players":[...]}
//! ← {"event":"ack","ack":3,"success":true,"roomId":"room_1_x8k2p0q","seatNumber":2,...}
//! ```
//!
//! The protocol layer sits between transport (raw frames) and the room
//! layer. It doesn't know about rooms as state, only about their shape on
//! the wire.

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{
    Ack, AckData, AckProbe, ButtonClick, ControllerConnected, ControllerInput, ControllerInputEvent,
    ControllerRequest, CreateRoom, DisplayRequest, GameCountdown, GameStart, PairWithPlayer,
    Relay, RelayedMessage, Request, RoomPlayersUpdated, RosterChange, ServerEvent, StartGame,
    ToggleReady,
};
pub use pairplay_transport::ConnectionId;
pub use types::{PairingCode, Pin, PlayerView, RoomId, RoomSnapshot};
