//! Room directory
//!
//! A room is present exactly while it has at least one member. Not
//! synchronized on its own; see [`super::RelayState`].

use std::collections::{HashMap, HashSet};

use super::connection::ConnectionId;
use super::RoomId;

/// Directory of active rooms
#[derive(Debug, Default)]
pub struct Directory {
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl Directory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, creating the room if absent. Returns `true` if the
    /// room was created by this call.
    pub fn join(&mut self, room: &str, id: ConnectionId) -> bool {
        match self.rooms.get_mut(room) {
            Some(members) => {
                members.insert(id);
                false
            }
            None => {
                self.rooms.insert(room.to_string(), HashSet::from([id]));
                true
            }
        }
    }

    /// Remove a member, deleting the room once empty. Returns `true` if
    /// the room was deleted by this call.
    pub fn leave(&mut self, room: &str, id: ConnectionId) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        members.remove(&id);
        if members.is_empty() {
            self.rooms.remove(room);
            true
        } else {
            false
        }
    }

    /// Current members of a room (empty if the room does not exist)
    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether the room exists
    pub fn contains(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Number of active rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether there are no active rooms
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    #[cfg(test)]
    fn assert_no_empty_rooms(&self) {
        for (room, members) in &self.rooms {
            assert!(!members.is_empty(), "room {room} is empty but present");
        }
    }
}
