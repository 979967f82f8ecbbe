//! Disconnect reconciliation.
//!
//! A closed socket isn't labelled with what it was doing, so every live
//! room is checked. In each room at most one of these applies:
//!
//! 1. it was the **host**: the room is destroyed with all its codes;
//! 2. it **occupied a seat**: that seat and its code are removed;
//! 3. it was a seat's **controller**: the seat is unpaired, nothing else.

use pairplay_protocol::{ConnectionId, RoomId};

use crate::registry::{Room, Seat};
use crate::RoomRegistry;

/// What a disconnect did to one room.
#[derive(Debug, Clone)]
pub enum Departure {
    /// The host left; this is the room as it was when destroyed.
    RoomClosed { room: Room },
    /// An occupant left; other seats keep their numbers and codes.
    SeatRemoved { room_id: RoomId, seat: Seat },
    /// A controller left; the seat stays and can be paired again.
    ControllerUnpaired {
        room_id: RoomId,
        seat_number: u32,
        occupant: ConnectionId,
    },
}

impl Departure {
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::RoomClosed { room } => &room.id,
            Self::SeatRemoved { room_id, .. } | Self::ControllerUnpaired { room_id, .. } => room_id,
        }
    }
}

impl RoomRegistry {
    /// Applies the teardown for `connection` to every room it touched.
    ///
    /// Returns one [`Departure`] per affected room; an empty list means the
    /// connection held nothing.
    pub fn remove_by_connection(&mut self, connection: ConnectionId) -> Vec<Departure> {
        let mut hosted = Vec::new();
        let mut departures = Vec::new();

        for room in self.rooms.values_mut() {
            if room.host == connection {
                hosted.push(room.id.clone());
                continue;
            }

            if let Some(index) = room.seats.iter().position(|s| s.occupant == connection) {
                let seat = room.seats.remove(index);
                self.codes.remove(&seat.pairing_code);
                tracing::info!(
                    room_id = %room.id,
                    %connection,
                    seat_number = seat.seat_number,
                    "seat removed"
                );
                departures.push(Departure::SeatRemoved {
                    room_id: room.id.clone(),
                    seat,
                });
                continue;
            }

            if let Some(seat) = room
                .seats
                .iter_mut()
                .find(|s| s.controller == Some(connection))
            {
                seat.controller = None;
                tracing::info!(
                    room_id = %room.id,
                    %connection,
                    seat_number = seat.seat_number,
                    "controller unpaired"
                );
                departures.push(Departure::ControllerUnpaired {
                    room_id: room.id.clone(),
                    seat_number: seat.seat_number,
                    occupant: seat.occupant,
                });
            }
        }

        for room_id in hosted {
            if let Some(room) = self.destroy_room(&room_id) {
                departures.push(Departure::RoomClosed { room });
            }
        }

        departures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoomConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    /// Host 1 with seats for 1, 2, and 3.
    fn seeded_room() -> (RoomRegistry, RoomId) {
        let mut reg = RoomRegistry::with_rng(&RoomConfig::default(), StdRng::seed_from_u64(5));
        let room_id = reg.create_room(cid(1), None, None).unwrap().id.clone();
        for n in 1..=3 {
            reg.join_seat(&room_id, cid(n), None).unwrap();
        }
        (reg, room_id)
    }

    #[test]
    fn test_remove_host_destroys_room_and_releases_codes() {
        let (mut reg, room_id) = seeded_room();
        let pin = reg.room(&room_id).unwrap().pin.clone();

        let departures = reg.remove_by_connection(cid(1));

        assert_eq!(departures.len(), 1);
        assert!(matches!(&departures[0], Departure::RoomClosed { room } if room.seats.len() == 3));
        assert!(reg.room(&room_id).is_none());
        assert!(reg.find_room_by_pin(&pin).is_err());
        assert_eq!(reg.live_pairing_codes(), 0);
    }

    #[test]
    fn test_remove_occupant_keeps_other_seats_unchanged() {
        let (mut reg, room_id) = seeded_room();
        let before = reg.room(&room_id).unwrap().seats.clone();

        let departures = reg.remove_by_connection(cid(2));

        assert!(matches!(
            &departures[..],
            [Departure::SeatRemoved { seat, .. }] if seat.seat_number == 2
        ));
        let after = &reg.room(&room_id).unwrap().seats;
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], before[2]);
        assert_eq!(after[1].seat_number, 3);
        assert_eq!(reg.live_pairing_codes(), 2);
    }

    #[test]
    fn test_remove_controller_only_clears_binding() {
        let (mut reg, room_id) = seeded_room();
        let code = reg.room(&room_id).unwrap().seats[1].pairing_code.clone();
        let pin = reg.room(&room_id).unwrap().pin.clone();
        reg.set_seat_ready(&room_id, cid(2), true);
        reg.pair(&pin, &code, cid(50)).unwrap();

        let departures = reg.remove_by_connection(cid(50));

        assert!(matches!(
            &departures[..],
            [Departure::ControllerUnpaired { seat_number: 2, .. }]
        ));
        let seat = &reg.room(&room_id).unwrap().seats[1];
        assert_eq!(seat.controller, None);
        assert_eq!(seat.pairing_code, code);
        assert!(seat.ready);

        // A fresh controller can pair with the same code.
        let paired = reg.pair(&pin, &code, cid(51)).unwrap();
        assert_eq!(paired.seat_number, 2);
    }

    #[test]
    fn test_remove_unknown_connection_changes_nothing() {
        let (mut reg, room_id) = seeded_room();
        assert!(reg.remove_by_connection(cid(99)).is_empty());
        assert_eq!(reg.room(&room_id).unwrap().seats.len(), 3);
    }

    #[test]
    fn test_remove_occupant_of_other_rooms_host_touches_both() {
        let (mut reg, first) = seeded_room();
        // Connection 2 sits in room one and hosts room two.
        let second = reg.create_room(cid(2), None, None).unwrap().id.clone();

        let departures = reg.remove_by_connection(cid(2));

        assert_eq!(departures.len(), 2);
        assert!(reg.room(&second).is_none());
        assert_eq!(reg.room(&first).unwrap().seats.len(), 2);
    }
}
