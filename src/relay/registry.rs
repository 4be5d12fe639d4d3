//! Connection registry
//!
//! Maps each live connection to its outbound handle and current room.
//! Not synchronized on its own; see [`super::RelayState`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use super::connection::{ConnectionHandle, ConnectionId};
use super::RoomId;

/// What the registry knows about one connection
#[derive(Clone)]
pub struct Registration {
    /// Outbound handle
    pub handle: Arc<ConnectionHandle>,
    /// Room the connection is currently in, if any
    pub room: Option<RoomId>,
}

/// Registry of live connections
#[derive(Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Registration>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with no room and return its fresh id
    pub fn register(&mut self, handle: Arc<ConnectionHandle>) -> ConnectionId {
        loop {
            let id = ConnectionId::new();
            if let Entry::Vacant(slot) = self.connections.entry(id) {
                slot.insert(Registration { handle, room: None });
                return id;
            }
        }
    }

    /// Remove a connection. Returns `None` if it was not registered.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Registration> {
        self.connections.remove(&id)
    }

    /// Outbound handle of a registered connection
    pub fn lookup(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&id).map(|r| Arc::clone(&r.handle))
    }

    /// Record the connection's current room. Returns `false` if the
    /// connection is not registered.
    pub fn set_room(&mut self, id: ConnectionId, room: Option<RoomId>) -> bool {
        match self.connections.get_mut(&id) {
            Some(registration) => {
                registration.room = room;
                true
            }
            None => false,
        }
    }

    /// Current room of a registered connection
    pub fn room_of(&self, id: ConnectionId) -> Option<&RoomId> {
        self.connections.get(&id).and_then(|r| r.room.as_ref())
    }

    /// Whether the connection is registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connections are registered
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
