//! The room registry: the single source of truth for rooms and seats.
//!
//! The registry is plain synchronous data with three indices kept in step:
//!
//! ```text
//! rooms: RoomId      → Room           (canonical)
//! pins:  Pin         → RoomId         (live rooms only)
//! codes: PairingCode → (RoomId, occupant)   (live seats, all rooms)
//! ```
//!
//! It does no I/O and never blocks. The coordinator actor owns the only
//! instance, which is what makes "allocate a code, then insert it" atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use pairplay_protocol::{ConnectionId, PairingCode, Pin, PlayerView, RoomId, RoomSnapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::allocator::CodeSpace;
use crate::error::Lookup;
use crate::{RepairPolicy, RoomConfig, RoomError, RoomPhase};

/// Counter for the sequence part of room ids.
static NEXT_ROOM_SEQ: AtomicU64 = AtomicU64::new(1);

const ID_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Milliseconds since the Unix epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Seat / Room
// ---------------------------------------------------------------------------

/// A join slot in a room, occupied by one display connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub occupant: ConnectionId,
    /// 1-based. Assigned once and never renumbered.
    pub seat_number: u32,
    pub pairing_code: PairingCode,
    /// The controller currently driving this seat.
    pub controller: Option<ConnectionId>,
    pub ready: bool,
    /// Display-name hint from the occupant's token.
    pub username: Option<String>,
}

impl Seat {
    /// The name shown for this seat.
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) => name.clone(),
            None => format!("Player {}", self.seat_number),
        }
    }

    fn view(&self) -> PlayerView {
        PlayerView {
            id: self.occupant.to_string(),
            seat_number: self.seat_number,
            pairing_code: self.pairing_code.clone(),
            is_connected: self.controller.is_some(),
            is_current_player: false,
            username: self.display_name(),
            ready: self.ready,
        }
    }
}

/// An ephemeral multiplayer session owned by its host connection.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub pin: Pin,
    pub name: String,
    /// The display that created the room. Only it may start the game.
    pub host: ConnectionId,
    pub max_seats: usize,
    /// Seats in join order.
    pub seats: Vec<Seat>,
    /// Unix millis.
    pub created_at: u64,
    pub phase: RoomPhase,
}

impl Room {
    pub fn seat(&self, occupant: ConnectionId) -> Option<&Seat> {
        self.seats.iter().find(|seat| seat.occupant == occupant)
    }

    pub(crate) fn seat_mut(&mut self, occupant: ConnectionId) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|seat| seat.occupant == occupant)
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.max_seats
    }

    /// Roster for displays, with no seat marked as the viewer's own.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            room_name: self.name.clone(),
            players: self.player_views(),
        }
    }

    pub fn player_views(&self) -> Vec<PlayerView> {
        self.seats.iter().map(Seat::view).collect()
    }
}

/// Result of a seat join.
#[derive(Debug, Clone)]
pub struct JoinedSeat {
    pub seat: Seat,
    /// `false` when the occupant already had this seat.
    pub is_new: bool,
}

// ---------------------------------------------------------------------------
// RoomRegistry
// ---------------------------------------------------------------------------

/// All live rooms and their lookup indices.
pub struct RoomRegistry {
    pub(crate) rooms: HashMap<RoomId, Room>,
    pub(crate) pins: HashMap<Pin, RoomId>,
    pub(crate) codes: HashMap<PairingCode, (RoomId, ConnectionId)>,
    pin_space: CodeSpace,
    code_space: CodeSpace,
    pub(crate) repair_policy: RepairPolicy,
    default_max_seats: usize,
    rng: StdRng,
}

impl RoomRegistry {
    /// Creates an empty registry seeded from the thread RNG.
    pub fn new(config: &RoomConfig) -> Self {
        Self::with_rng(config, StdRng::from_rng(&mut rand::rng()))
    }

    /// Creates an empty registry with a caller-supplied RNG (handy for
    /// deterministic tests).
    pub fn with_rng(config: &RoomConfig, rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            pins: HashMap::new(),
            codes: HashMap::new(),
            pin_space: CodeSpace::room_pins(config.saturation_ratio),
            code_space: CodeSpace::pairing_codes(config.saturation_ratio),
            repair_policy: config.repair_policy,
            default_max_seats: config.default_max_seats,
            rng,
        }
    }

    // -- Allocation -------------------------------------------------------

    fn allocate_room_pin(&mut self) -> Result<Pin, RoomError> {
        let pins = &self.pins;
        let n = self.pin_space.allocate(&mut self.rng, pins.len(), |n| {
            Pin::from_number(n).is_ok_and(|pin| pins.contains_key(&pin))
        })?;
        Ok(Pin::from_number(n)?)
    }

    fn allocate_pairing_code(&mut self) -> Result<PairingCode, RoomError> {
        let codes = &self.codes;
        let n = self.code_space.allocate(&mut self.rng, codes.len(), |n| {
            PairingCode::from_number(n).is_ok_and(|code| codes.contains_key(&code))
        })?;
        Ok(PairingCode::from_number(n)?)
    }

    fn next_room_id(&mut self) -> RoomId {
        let seq = NEXT_ROOM_SEQ.fetch_add(1, Ordering::Relaxed);
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| BASE36[self.rng.random_range(0..BASE36.len())] as char)
            .collect();
        RoomId::new(format!("room_{seq}_{suffix}"))
    }

    // -- Mutations --------------------------------------------------------

    /// Creates an empty room owned by `host`.
    ///
    /// A blank or missing `name` becomes `"Room {pin}"`; a missing
    /// `max_seats` uses the configured default.
    ///
    /// # Errors
    /// - [`RoomError::Malformed`] if `max_seats` is zero.
    /// - [`RoomError::ResourceExhausted`] if no PIN is free.
    pub fn create_room(
        &mut self,
        host: ConnectionId,
        name: Option<&str>,
        max_seats: Option<usize>,
    ) -> Result<&Room, RoomError> {
        let max_seats = max_seats.unwrap_or(self.default_max_seats);
        if max_seats == 0 {
            return Err(RoomError::Malformed("maxSeats must be at least 1".into()));
        }

        let pin = self.allocate_room_pin()?;
        let id = self.next_room_id();
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Room {pin}"),
        };

        let room = Room {
            id: id.clone(),
            pin: pin.clone(),
            name,
            host,
            max_seats,
            seats: Vec::new(),
            created_at: unix_millis(),
            phase: RoomPhase::Waiting,
        };

        tracing::info!(room_id = %id, %pin, %host, max_seats, "room created");
        self.pins.insert(pin, id.clone());
        Ok(self.rooms.entry(id).or_insert(room))
    }

    /// Seats `occupant` in the room.
    ///
    /// Joining a room the occupant already sits in returns the existing
    /// seat unchanged, with `is_new == false`.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] if the room is gone.
    /// - [`RoomError::InvalidState`] once the room has left `Waiting`.
    /// - [`RoomError::Full`] if every seat is taken.
    /// - [`RoomError::ResourceExhausted`] if no pairing code is free.
    pub fn join_seat(
        &mut self,
        room_id: &RoomId,
        occupant: ConnectionId,
        username: Option<&str>,
    ) -> Result<JoinedSeat, RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or(RoomError::NotFound(Lookup::Room))?;
        if !room.phase.is_open() {
            return Err(RoomError::InvalidState(format!(
                "Room is not accepting players ({})",
                room.phase
            )));
        }
        if let Some(seat) = room.seat(occupant) {
            return Ok(JoinedSeat {
                seat: seat.clone(),
                is_new: false,
            });
        }
        if room.is_full() {
            return Err(RoomError::Full);
        }

        // Count-based, so a join after a removal can repeat the number of
        // a later seat. Pairing codes stay the unique seat handle.
        let seat_number = room.seats.len() as u32 + 1;
        let pairing_code = self.allocate_pairing_code()?;
        let seat = Seat {
            occupant,
            seat_number,
            pairing_code: pairing_code.clone(),
            controller: None,
            ready: false,
            username: username.map(str::to_string),
        };

        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or(RoomError::NotFound(Lookup::Room))?;
        room.seats.push(seat.clone());
        self.codes
            .insert(pairing_code.clone(), (room_id.clone(), occupant));

        tracing::info!(
            %room_id,
            %occupant,
            seat_number,
            %pairing_code,
            seats = room.seats.len(),
            "seat joined"
        );
        Ok(JoinedSeat { seat, is_new: true })
    }

    /// Sets the ready flag of `occupant`'s seat.
    ///
    /// Returns `false` if the room or the seat doesn't exist.
    pub fn set_seat_ready(&mut self, room_id: &RoomId, occupant: ConnectionId, ready: bool) -> bool {
        match self
            .rooms
            .get_mut(room_id)
            .and_then(|room| room.seat_mut(occupant))
        {
            Some(seat) => {
                seat.ready = ready;
                true
            }
            None => false,
        }
    }

    /// Deletes a room and releases its PIN and every seat's pairing code.
    pub(crate) fn destroy_room(&mut self, room_id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(room_id)?;
        self.pins.remove(&room.pin);
        for seat in &room.seats {
            self.codes.remove(&seat.pairing_code);
        }
        tracing::info!(%room_id, pin = %room.pin, seats = room.seats.len(), "room destroyed");
        Some(room)
    }

    // -- Queries ----------------------------------------------------------

    /// Looks up a live room by its PIN.
    ///
    /// # Errors
    /// Returns [`RoomError::NotFound`] if no live room has that PIN.
    pub fn find_room_by_pin(&self, pin: &Pin) -> Result<&Room, RoomError> {
        self.pins
            .get(pin)
            .and_then(|id| self.rooms.get(id))
            .ok_or(RoomError::NotFound(Lookup::Room))
    }

    /// `true` iff the room has at least one seat and every seat is ready.
    pub fn all_ready(&self, room_id: &RoomId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|room| !room.seats.is_empty() && room.seats.iter().all(|s| s.ready))
    }

    pub fn is_host(&self, connection: ConnectionId, room_id: &RoomId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|room| room.host == connection)
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of pairing codes currently held by seats.
    pub fn live_pairing_codes(&self) -> usize {
        self.codes.len()
    }

    /// The room and seat a controller is paired with, if any.
    pub fn seat_for_controller(&self, controller: ConnectionId) -> Option<(&Room, &Seat)> {
        self.rooms.values().find_map(|room| {
            room.seats
                .iter()
                .find(|seat| seat.controller == Some(controller))
                .map(|seat| (room, seat))
        })
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn registry() -> RoomRegistry {
        RoomRegistry::with_rng(&RoomConfig::default(), StdRng::seed_from_u64(42))
    }

    fn create(reg: &mut RoomRegistry, host: u64, max_seats: Option<usize>) -> RoomId {
        reg.create_room(cid(host), None, max_seats)
            .expect("create should succeed")
            .id
            .clone()
    }

    // =====================================================================
    // create_room()
    // =====================================================================

    #[test]
    fn test_create_room_defaults_name_and_seats() {
        let mut reg = registry();
        let room = reg.create_room(cid(1), Some("  "), None).unwrap();

        assert_eq!(room.name, format!("Room {}", room.pin));
        assert_eq!(room.max_seats, 4);
        assert_eq!(room.phase, RoomPhase::Waiting);
        assert!(room.seats.is_empty());
        assert!(room.id.as_str().starts_with("room_"));

        let pin = room.pin.clone();
        let n: u32 = pin.as_str().parse().unwrap();
        assert!((1000..=9999).contains(&n));
        assert_eq!(reg.find_room_by_pin(&pin).unwrap().host, cid(1));
    }

    #[test]
    fn test_create_room_zero_seats_returns_malformed() {
        let mut reg = registry();
        let result = reg.create_room(cid(1), None, Some(0));
        assert!(matches!(result, Err(RoomError::Malformed(_))));
        assert_eq!(reg.room_count(), 0);
    }

    #[test]
    fn test_create_room_pins_and_ids_are_unique() {
        let mut reg = registry();
        let mut pins = HashSet::new();
        let mut ids = HashSet::new();

        for host in 0..300 {
            let room = reg.create_room(cid(host), None, None).unwrap();
            assert!(pins.insert(room.pin.clone()));
            assert!(ids.insert(room.id.clone()));
        }
        assert_eq!(reg.room_count(), 300);
    }

    // =====================================================================
    // join_seat()
    // =====================================================================

    #[test]
    fn test_join_seat_numbers_seats_in_join_order() {
        let mut reg = registry();
        let room_id = create(&mut reg, 1, None);

        let first = reg.join_seat(&room_id, cid(1), None).unwrap();
        let second = reg.join_seat(&room_id, cid(2), Some("ana")).unwrap();

        assert!(first.is_new && second.is_new);
        assert_eq!(first.seat.seat_number, 1);
        assert_eq!(second.seat.seat_number, 2);
        assert_ne!(first.seat.pairing_code, second.seat.pairing_code);
        assert_eq!(first.seat.display_name(), "Player 1");
        assert_eq!(second.seat.display_name(), "ana");
        assert_eq!(reg.live_pairing_codes(), 2);
    }

    #[test]
    fn test_join_seat_after_removal_numbers_by_seat_count() {
        let mut reg = registry();
        let room_id = create(&mut reg, 1, None);
        for occupant in 1..=3 {
            reg.join_seat(&room_id, cid(occupant), None).unwrap();
        }
        reg.remove_by_connection(cid(2));

        let late = reg.join_seat(&room_id, cid(4), None).unwrap();

        // Two seats remain, so the newcomer is numbered 3 alongside the
        // existing seat 3. Nothing is renumbered.
        assert_eq!(late.seat.seat_number, 3);
        let numbers: Vec<u32> = reg.room(&room_id).unwrap().seats.iter().map(|s| s.seat_number).collect();
        assert_eq!(numbers, vec![1, 3, 3]);
        let codes: HashSet<_> = reg.room(&room_id).unwrap().seats.iter().map(|s| s.pairing_code.clone()).collect();
        assert_eq!(codes.len(), 3, "pairing codes stay distinct");
    }

    #[test]
    fn test_join_seat_twice_returns_same_seat() {
        let mut reg = registry();
        let room_id = create(&mut reg, 1, None);

        let first = reg.join_seat(&room_id, cid(2), None).unwrap();
        let again = reg.join_seat(&room_id, cid(2), None).unwrap();

        assert!(!again.is_new);
        assert_eq!(first.seat, again.seat);
        assert_eq!(reg.room(&room_id).unwrap().seats.len(), 1);
        assert_eq!(reg.live_pairing_codes(), 1);
    }

    #[test]
    fn test_join_seat_full_room_returns_full() {
        let mut reg = registry();
        let room_id = create(&mut reg, 1, Some(2));
        reg.join_seat(&room_id, cid(1), None).unwrap();
        reg.join_seat(&room_id, cid(2), None).unwrap();

        let result = reg.join_seat(&room_id, cid(3), None);
        assert!(matches!(result, Err(RoomError::Full)));
        assert_eq!(result.unwrap_err().to_string(), "Room is full");
    }

    #[test]
    fn test_join_seat_unknown_room_returns_not_found() {
        let mut reg = registry();
        let result = reg.join_seat(&RoomId::new("room_0_nope"), cid(1), None);
        let err = result.unwrap_err();
        assert!(matches!(err, RoomError::NotFound(Lookup::Room)));
        assert_eq!(err.to_string(), "Room not found");
    }

    #[test]
    fn test_join_seat_after_waiting_returns_invalid_state() {
        let mut reg = registry();
        let room_id = create(&mut reg, 1, None);
        reg.join_seat(&room_id, cid(2), None).unwrap();
        reg.rooms.get_mut(&room_id).unwrap().phase = RoomPhase::Countdown;

        // Even the existing occupant is turned away.
        assert!(matches!(
            reg.join_seat(&room_id, cid(2), None),
            Err(RoomError::InvalidState(_))
        ));
        assert!(matches!(
            reg.join_seat(&room_id, cid(3), None),
            Err(RoomError::InvalidState(_))
        ));
    }

    #[test]
    fn test_pairing_codes_unique_across_rooms() {
        let mut reg = registry();
        let mut codes = HashSet::new();
        for host in 0..50 {
            let room_id = create(&mut reg, host * 10, None);
            for n in 0..4 {
                let joined = reg.join_seat(&room_id, cid(host * 10 + n), None).unwrap();
                assert!(codes.insert(joined.seat.pairing_code));
            }
        }
        assert_eq!(reg.live_pairing_codes(), 200);
    }

    #[test]
    fn test_pairing_code_saturation_returns_resource_exhausted() {
        let config = RoomConfig {
            saturation_ratio: 0.0105, // nine live codes at most
            ..RoomConfig::default()
        };
        let mut reg = RoomRegistry::with_rng(&config, StdRng::seed_from_u64(9));
        let room_id = reg.create_room(cid(1), None, Some(20)).unwrap().id.clone();

        for n in 0..9 {
            reg.join_seat(&room_id, cid(100 + n), None).unwrap();
        }
        let result = reg.join_seat(&room_id, cid(200), None);
        assert!(matches!(result, Err(RoomError::ResourceExhausted("pairing code"))));
    }

    // =====================================================================
    // readiness / host
    // =====================================================================

    #[test]
    fn test_all_ready_false_for_empty_room() {
        let mut reg = registry();
        let room_id = create(&mut reg, 1, None);
        assert!(!reg.all_ready(&room_id));
    }

    #[test]
    fn test_all_ready_requires_every_seat() {
        let mut reg = registry();
        let room_id = create(&mut reg, 1, None);
        reg.join_seat(&room_id, cid(1), None).unwrap();
        reg.join_seat(&room_id, cid(2), None).unwrap();

        assert!(reg.set_seat_ready(&room_id, cid(1), true));
        assert!(!reg.all_ready(&room_id));
        assert!(reg.set_seat_ready(&room_id, cid(2), true));
        assert!(reg.all_ready(&room_id));
        assert!(!reg.set_seat_ready(&room_id, cid(9), true));
    }

    #[test]
    fn test_is_host_only_for_creator() {
        let mut reg = registry();
        let room_id = create(&mut reg, 1, None);
        assert!(reg.is_host(cid(1), &room_id));
        assert!(!reg.is_host(cid(2), &room_id));
        assert!(!reg.is_host(cid(1), &RoomId::new("room_0_x")));
    }

    #[test]
    fn test_snapshot_lists_seats_with_fallback_names() {
        let mut reg = registry();
        let room_id = create(&mut reg, 1, None);
        reg.join_seat(&room_id, cid(1), Some("host")).unwrap();
        reg.join_seat(&room_id, cid(2), None).unwrap();

        let snapshot = reg.room(&room_id).unwrap().snapshot();
        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.players[0].id, "conn-1");
        assert_eq!(snapshot.players[0].username, "host");
        assert_eq!(snapshot.players[1].username, "Player 2");
        assert!(!snapshot.players[1].is_connected);
    }
}
