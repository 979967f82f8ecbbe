//! The session manager: every live connection and the channels it listens on.
//!
//! Outbound delivery is queue-based. Each connection registers an
//! unbounded sender ([`Outbound`]); the gateway drains the matching
//! receiver into the socket on its own task. Sending from here therefore
//! never waits on a slow client.
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself. It is owned by the room
//! coordinator task, so lookups and broadcasts happen in the same turn as
//! the room mutation that triggered them.

use std::collections::{BTreeSet, HashMap, HashSet};

use pairplay_protocol::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;

use crate::{ConnectionClass, Session, SessionError};

/// Queue feeding one connection's socket writer.
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

struct Entry {
    session: Session,
    outbound: Outbound,
    channels: HashSet<String>,
}

/// Tracks live sessions, their outbound queues, and channel membership.
///
/// ```text
/// register() ──→ subscribe(channel) ──→ broadcast(channel, event)
///     │                                        │
///     │                   close_channel() ◄────┘ (room destroyed)
///     ▼
/// unregister() ── drops the session and all of its memberships
/// ```
#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<ConnectionId, Entry>,
    /// Channel name → subscribed display connections. `BTreeSet` keeps
    /// fan-out order stable.
    channels: HashMap<String, BTreeSet<ConnectionId>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a connection.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyRegistered`] if the connection id is
    /// already known.
    pub fn register(&mut self, session: Session, outbound: Outbound) -> Result<(), SessionError> {
        let id = session.connection_id;
        if self.sessions.contains_key(&id) {
            return Err(SessionError::AlreadyRegistered(id));
        }
        tracing::debug!(connection_id = %id, class = %session.class, "session registered");
        self.sessions.insert(
            id,
            Entry {
                session,
                outbound,
                channels: HashSet::new(),
            },
        );
        Ok(())
    }

    /// Stops tracking a connection and removes it from every channel.
    ///
    /// Returns the session, or `None` if it was never registered.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Session> {
        let entry = self.sessions.remove(&id)?;
        for channel in &entry.channels {
            if let Some(members) = self.channels.get_mut(channel) {
                members.remove(&id);
                if members.is_empty() {
                    self.channels.remove(channel);
                }
            }
        }
        tracing::debug!(connection_id = %id, "session unregistered");
        Some(entry.session)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id).map(|entry| &entry.session)
    }

    /// Adds a display connection to a channel. Joining twice is a no-op.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: the connection isn't registered.
    /// - [`SessionError::NotSubscribable`]: the connection is a controller.
    pub fn subscribe(&mut self, id: ConnectionId, channel: &str) -> Result<(), SessionError> {
        let entry = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;
        if entry.session.class != ConnectionClass::Display {
            return Err(SessionError::NotSubscribable(id));
        }
        entry.channels.insert(channel.to_string());
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(id);
        Ok(())
    }

    /// Removes a connection from a channel, if it was a member.
    pub fn unsubscribe(&mut self, id: ConnectionId, channel: &str) {
        if let Some(entry) = self.sessions.get_mut(&id) {
            entry.channels.remove(channel);
        }
        if let Some(members) = self.channels.get_mut(channel) {
            members.remove(&id);
            if members.is_empty() {
                self.channels.remove(channel);
            }
        }
    }

    /// Deletes a channel and returns whoever was subscribed to it.
    pub fn close_channel(&mut self, channel: &str) -> Vec<ConnectionId> {
        let members = self.channels.remove(channel).unwrap_or_default();
        for id in &members {
            if let Some(entry) = self.sessions.get_mut(id) {
                entry.channels.remove(channel);
            }
        }
        members.into_iter().collect()
    }

    /// Current members of a channel, in id order.
    pub fn members(&self, channel: &str) -> Vec<ConnectionId> {
        self.channels
            .get(channel)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Queues an event for one connection.
    ///
    /// Returns `false` if the connection is gone or its writer has stopped.
    pub fn send_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        match self.sessions.get(&id) {
            Some(entry) => entry.outbound.send(event).is_ok(),
            None => false,
        }
    }

    /// Queues the same event for every member of a channel.
    ///
    /// Returns how many connections it was queued for.
    pub fn broadcast(&self, channel: &str, event: &ServerEvent) -> usize {
        self.broadcast_with(channel, |_| event.clone())
    }

    /// Queues a per-member event for every member of a channel.
    ///
    /// `build` is called once per member, so each recipient can get its own
    /// view (e.g. a roster with its own seat marked).
    pub fn broadcast_with<F>(&self, channel: &str, mut build: F) -> usize
    where
        F: FnMut(ConnectionId) -> ServerEvent,
    {
        let Some(members) = self.channels.get(channel) else {
            return 0;
        };
        members
            .iter()
            .filter(|id| self.send_to(**id, build(**id)))
            .count()
    }

    /// Queues an event for every connection of the given class.
    pub fn broadcast_class(&self, class: ConnectionClass, event: &ServerEvent) -> usize {
        self.sessions
            .iter()
            .filter(|(_, entry)| entry.session.class == class)
            .filter(|(id, _)| self.send_to(**id, event.clone()))
            .count()
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
