//! Binding controllers to seats.
//!
//! A controller types two codes: the room PIN and the pairing code shown
//! on a seat. The PIN is only an existence check. The pairing code is
//! resolved through the global index, so a code belonging to a different
//! live room still pairs. Codes are a convenience, not an access control.

use pairplay_protocol::{ConnectionId, PairingCode, Pin, RoomId};

use crate::error::Lookup;
use crate::{RepairPolicy, RoomError, RoomRegistry};

/// A successful pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub room_id: RoomId,
    pub room_name: String,
    pub seat_number: u32,
    /// The display occupying the paired seat.
    pub occupant: ConnectionId,
    /// The controller that lost this seat to the new one, if any.
    pub replaced: Option<ConnectionId>,
    /// The room and occupant of the seat this controller was driving
    /// before, now unpaired.
    pub released: Option<(RoomId, ConnectionId)>,
}

impl RoomRegistry {
    /// Pairs `controller` with the seat showing `code`, after checking the
    /// PIN names a live room.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] if the PIN or the code is not live.
    /// - [`RoomError::InvalidState`] if the seat is bound to another
    ///   controller under [`RepairPolicy::Reject`].
    pub fn pair(
        &mut self,
        pin: &Pin,
        code: &PairingCode,
        controller: ConnectionId,
    ) -> Result<Pairing, RoomError> {
        self.find_room_by_pin(pin)?;
        self.pair_controller(code, controller)
    }

    /// Pairs `controller` with the seat showing `code`.
    ///
    /// A controller drives at most one seat, so any earlier binding it
    /// held is released first. Pairing the seat it already drives is a
    /// no-op success.
    ///
    /// # Errors
    /// See [`RoomRegistry::pair`].
    pub fn pair_controller(
        &mut self,
        code: &PairingCode,
        controller: ConnectionId,
    ) -> Result<Pairing, RoomError> {
        let (room_id, occupant) = self
            .codes
            .get(code)
            .cloned()
            .ok_or(RoomError::NotFound(Lookup::PairingCode))?;

        let current = self
            .rooms
            .get(&room_id)
            .and_then(|room| room.seat(occupant))
            .ok_or(RoomError::NotFound(Lookup::PairingCode))?
            .controller;

        let replaced = match current {
            Some(existing) if existing == controller => None,
            Some(existing) => match self.repair_policy {
                RepairPolicy::Reject => {
                    return Err(RoomError::InvalidState(
                        "Seat already has a controller".into(),
                    ));
                }
                RepairPolicy::Transfer => Some(existing),
            },
            None => None,
        };

        let released = self.release_other_binding(controller, &room_id, occupant);

        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::NotFound(Lookup::PairingCode))?;
        let room_name = room.name.clone();
        let seat = room
            .seat_mut(occupant)
            .ok_or(RoomError::NotFound(Lookup::PairingCode))?;
        seat.controller = Some(controller);

        if let Some(previous) = replaced {
            tracing::info!(%room_id, %controller, %previous, seat_number = seat.seat_number, "seat transferred to new controller");
        } else {
            tracing::info!(%room_id, %controller, seat_number = seat.seat_number, "controller paired");
        }

        Ok(Pairing {
            room_id,
            room_name,
            seat_number: seat.seat_number,
            occupant,
            replaced,
            released,
        })
    }

    /// Clears `controller` from any seat other than (`room_id`, `occupant`).
    fn release_other_binding(
        &mut self,
        controller: ConnectionId,
        room_id: &RoomId,
        occupant: ConnectionId,
    ) -> Option<(RoomId, ConnectionId)> {
        for room in self.rooms.values_mut() {
            for seat in &mut room.seats {
                let is_target = &room.id == room_id && seat.occupant == occupant;
                if !is_target && seat.controller == Some(controller) {
                    seat.controller = None;
                    return Some((room.id.clone(), seat.occupant));
                }
            }
        }
        None
    }
}
