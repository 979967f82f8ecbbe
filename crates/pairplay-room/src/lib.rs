//! Room lifecycle and controller pairing for Pairplay.
//!
//! All room state lives in a [`RoomRegistry`] owned by a single coordinator
//! task (actor model). Gateways talk to it through a [`CoordinatorHandle`].
//!
//! # Key types
//!
//! - [`RoomRegistry`]: rooms, seats, PIN and pairing-code indices
//! - [`CoordinatorHandle`]: send requests to the running coordinator
//! - [`RoomPhase`]: the `Waiting → Countdown → Started` state machine
//! - [`RoomConfig`]: seat limits, countdown length, pairing policy
//! - [`MatchRecorder`]: optional hook for persisting match history

mod allocator;
mod config;
mod coordinator;
mod error;
mod lifecycle;
mod pairing;
mod reconcile;
mod recorder;
mod registry;

pub use allocator::CodeSpace;
pub use config::{RepairPolicy, RoomConfig, RoomPhase};
pub use coordinator::{CoordinatorHandle, CoordinatorStats, spawn_coordinator};
pub use error::{Lookup, RoomError};
pub use lifecycle::StartPlan;
pub use pairing::Pairing;
pub use reconcile::Departure;
pub use recorder::{MatchRecorder, NoopRecorder, TracingRecorder};
pub use registry::{JoinedSeat, Room, RoomRegistry, Seat};
