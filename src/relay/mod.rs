//! Room relay core
//!
//! Tracks which connection is in which room and routes signaling and
//! caption frames between them.

#[allow(dead_code)]
mod connection;
#[allow(dead_code)]
mod directory;
mod dispatcher;
mod lifecycle;
#[allow(dead_code)]
mod registry;
mod router;
#[allow(dead_code)]
mod state;

#[allow(unused_imports)]
pub use connection::{ConnectionHandle, ConnectionId};
pub use lifecycle::{Lifecycle, Session};
pub use router::Router;
pub use state::{RelayState, Stats};

/// Caller-chosen room identifier
pub type RoomId = String;
