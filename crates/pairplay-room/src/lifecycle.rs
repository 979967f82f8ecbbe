//! Readiness, countdown, and start.
//!
//! Check order for a start request is fixed so clients get a stable error:
//! room exists, requester is host, room is `Waiting`, every seat is ready.

use std::time::Duration;

use pairplay_protocol::{ConnectionId, PlayerView, RoomId};

use crate::error::Lookup;
use crate::{RoomError, RoomPhase, RoomRegistry};

/// A start that has been accepted and is counting down.
///
/// The roster is captured when the start is requested, so `game_start`
/// lists exactly the seats that were ready at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPlan {
    pub room_id: RoomId,
    pub game_type: String,
    /// Unix millis at which the round starts.
    pub start_at: u64,
    pub countdown: Duration,
    pub players: Vec<PlayerView>,
}

impl RoomRegistry {
    /// Marks `occupant`'s seat ready or not ready.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] if the room or the seat is gone.
    /// - [`RoomError::InvalidState`] once the room has left `Waiting`.
    pub fn toggle_ready(
        &mut self,
        room_id: &RoomId,
        occupant: ConnectionId,
        ready: bool,
    ) -> Result<(), RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or(RoomError::NotFound(Lookup::Room))?;
        if !room.phase.is_open() {
            return Err(RoomError::InvalidState(format!(
                "Cannot change readiness during {}",
                room.phase
            )));
        }
        if !self.set_seat_ready(room_id, occupant, ready) {
            return Err(RoomError::NotFound(Lookup::Seat));
        }
        tracing::debug!(%room_id, %occupant, ready, "seat readiness changed");
        Ok(())
    }

    /// Moves the room into `Countdown` and returns what to announce.
    ///
    /// `now_ms` is the current Unix time; `start_at` is `now_ms + countdown`.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] if the room is gone.
    /// - [`RoomError::Forbidden`] unless `requester` is the host.
    /// - [`RoomError::InvalidState`] unless the room is `Waiting`.
    /// - [`RoomError::Precondition`] unless there is a seat and all seats
    ///   are ready.
    pub fn request_start(
        &mut self,
        room_id: &RoomId,
        requester: ConnectionId,
        game_type: String,
        countdown: Duration,
        now_ms: u64,
    ) -> Result<StartPlan, RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or(RoomError::NotFound(Lookup::Room))?;
        if room.host != requester {
            return Err(RoomError::Forbidden("start the game"));
        }
        if room.phase != RoomPhase::Waiting {
            return Err(RoomError::InvalidState(format!(
                "Game already {}",
                match room.phase {
                    RoomPhase::Countdown => "counting down",
                    _ => "started",
                }
            )));
        }
        if room.seats.is_empty() {
            return Err(RoomError::Precondition("At least one player is required"));
        }
        if !self.all_ready(room_id) {
            return Err(RoomError::Precondition("Not all players are ready"));
        }

        let players = room.player_views();
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.phase = RoomPhase::Countdown;
        }

        let start_at = now_ms + countdown.as_millis() as u64;
        tracing::info!(%room_id, %game_type, start_at, players = players.len(), "countdown started");
        Ok(StartPlan {
            room_id: room_id.clone(),
            game_type,
            start_at,
            countdown,
            players,
        })
    }

    /// Moves a counting-down room into `Started`.
    ///
    /// Returns `false` (and changes nothing) if the room is gone or not in
    /// `Countdown`; the caller should then skip the `game_start` broadcast.
    pub fn complete_start(&mut self, room_id: &RoomId) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) if room.phase == RoomPhase::Countdown => {
                room.phase = RoomPhase::Started;
                tracing::info!(%room_id, "game started");
                true
            }
            _ => false,
        }
    }
}
