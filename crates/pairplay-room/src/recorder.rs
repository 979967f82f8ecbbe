//! Hook for an external match-history store.
//!
//! The coordinator reports two moments: a room being created and a round
//! starting. Calls are made from inside the coordinator task, so an
//! implementation that talks to a database must hand the work off (e.g.
//! `tokio::spawn`) and return immediately.

use pairplay_protocol::RoomId;

use crate::registry::Room;

/// Receives match lifecycle notifications.
///
/// # Example
///
/// ```rust
/// use pairplay_protocol::RoomId;
/// use pairplay_room::{MatchRecorder, Room};
///
/// struct CountingRecorder(std::sync::atomic::AtomicUsize);
///
/// impl MatchRecorder for CountingRecorder {
///     fn room_created(&self, _room: &Room, _host_user: Option<&str>) {
///         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
///     }
///
///     fn round_started(&self, _room_id: &RoomId, _game_type: &str) {}
/// }
/// ```
pub trait MatchRecorder: Send + Sync + 'static {
    /// A room was created. `host_user` is the host's external user id, if
    /// its token carried one.
    fn room_created(&self, room: &Room, host_user: Option<&str>);

    /// A room's countdown finished and the round began.
    fn round_started(&self, room_id: &RoomId, game_type: &str);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl MatchRecorder for NoopRecorder {
    fn room_created(&self, _room: &Room, _host_user: Option<&str>) {}

    fn round_started(&self, _room_id: &RoomId, _game_type: &str) {}
}

/// Logs every notification at `info` under the `pairplay::matches` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRecorder;

impl MatchRecorder for TracingRecorder {
    fn room_created(&self, room: &Room, host_user: Option<&str>) {
        tracing::info!(
            target: "pairplay::matches",
            room_id = %room.id,
            pin = %room.pin,
            host_user,
            "match session created"
        );
    }

    fn round_started(&self, room_id: &RoomId, game_type: &str) {
        tracing::info!(target: "pairplay::matches", %room_id, game_type, "match session started");
    }
}
