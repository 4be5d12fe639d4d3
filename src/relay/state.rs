//! Shared relay state
//!
//! Registry and directory live behind one mutex so they can never drift
//! apart. Every operation returns owned snapshots; frames are delivered
//! after the lock is released.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::connection::{ConnectionHandle, ConnectionId};
use super::directory::Directory;
use super::registry::Registry;
use super::RoomId;

/// A room member captured under the lock
#[derive(Clone)]
pub struct Member {
    pub id: ConnectionId,
    pub handle: Arc<ConnectionHandle>,
}

/// A connection left a room
pub struct Departure {
    /// The room that was left
    pub room: RoomId,
    /// Members still in the room; empty if the room was pruned
    pub remaining: Vec<Member>,
}

/// Result of [`RelayState::join`]
pub enum JoinOutcome {
    /// The connection was already in this room; nothing changed
    AlreadyMember,
    /// The connection entered the room
    Joined {
        /// Prior room the connection was moved out of
        left: Option<Departure>,
        /// Whether this join created the room
        created: bool,
        /// Room membership after the join, including the joiner
        members: Vec<Member>,
    },
}

/// Point-in-time counts for the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub active_users: usize,
    pub active_rooms: usize,
}

#[derive(Default)]
struct Tables {
    registry: Registry,
    directory: Directory,
}

impl Tables {
    fn snapshot(&self, room: &str) -> Vec<Member> {
        self.directory
            .members(room)
            .into_iter()
            .filter_map(|id| {
                self.registry
                    .lookup(id)
                    .map(|handle| Member { id, handle })
            })
            .collect()
    }

    fn leave_current(&mut self, id: ConnectionId) -> Option<Departure> {
        let room = self.registry.room_of(id)?.clone();
        self.registry.set_room(id, None);
        self.directory.leave(&room, id);
        let remaining = self.snapshot(&room);
        Some(Departure { room, remaining })
    }
}

/// Registry and room directory under one exclusion lock
#[derive(Default)]
pub struct RelayState {
    tables: Mutex<Tables>,
}

impl RelayState {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with no room
    pub async fn register(&self, handle: Arc<ConnectionHandle>) -> ConnectionId {
        self.tables.lock().await.registry.register(handle)
    }

    /// Move a connection into a room.
    ///
    /// A connection already in a different room leaves it first, in the same
    /// critical section. Returns `None` if the connection is not registered.
    pub async fn join(&self, id: ConnectionId, room: &str) -> Option<JoinOutcome> {
        let mut tables = self.tables.lock().await;
        if !tables.registry.contains(id) {
            return None;
        }
        if tables.registry.room_of(id).map(String::as_str) == Some(room) {
            return Some(JoinOutcome::AlreadyMember);
        }

        let left = tables.leave_current(id);
        let created = tables.directory.join(room, id);
        tables.registry.set_room(id, Some(room.to_string()));
        let members = tables.snapshot(room);

        Some(JoinOutcome::Joined {
            left,
            created,
            members,
        })
    }

    /// Current room of a connection and a snapshot of its members
    pub async fn current_room(&self, id: ConnectionId) -> Option<(RoomId, Vec<Member>)> {
        let tables = self.tables.lock().await;
        let room = tables.registry.room_of(id)?.clone();
        let members = tables.snapshot(&room);
        Some((room, members))
    }

    /// Outbound handle of a registered connection
    pub async fn lookup(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.tables.lock().await.registry.lookup(id)
    }

    /// Remove a connection from its room and from the registry.
    ///
    /// Returns the removed handle and the room it left, if any. Returns
    /// `None` if the connection was already removed, so repeated calls have
    /// no further effect.
    pub async fn remove(
        &self,
        id: ConnectionId,
    ) -> Option<(Arc<ConnectionHandle>, Option<Departure>)> {
        let mut tables = self.tables.lock().await;
        let handle = tables.registry.lookup(id)?;
        let departure = tables.leave_current(id);
        tables.registry.unregister(id);
        Some((handle, departure))
    }

    /// Members of a room (empty if the room does not exist)
    pub async fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.tables.lock().await.directory.members(room)
    }

    /// Whether a room exists
    pub async fn has_room(&self, room: &str) -> bool {
        self.tables.lock().await.directory.contains(room)
    }

    /// Registry and directory sizes
    pub async fn stats(&self) -> Stats {
        let tables = self.tables.lock().await;
        Stats {
            active_users: tables.registry.len(),
            active_rooms: tables.directory.len(),
        }
    }
}
