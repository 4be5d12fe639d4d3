//! Connection lifecycle
//!
//! Registers connections as they are accepted and tears them down exactly
//! once when their transport closes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::connection::{ConnectionHandle, ConnectionId};
use super::dispatcher;
use super::state::RelayState;
use crate::server::ServerMessage;

/// A newly registered connection
pub struct Session {
    /// Assigned connection id
    pub id: ConnectionId,
    /// Outbound handle shared with the registry
    pub handle: Arc<ConnectionHandle>,
    /// Frames queued for this connection's socket
    pub outbound: mpsc::Receiver<Arc<str>>,
}

/// Keeps registry and directory consistent as connections come and go
#[derive(Clone)]
pub struct Lifecycle {
    state: Arc<RelayState>,
    shutdown: CancellationToken,
    queue_capacity: usize,
}

impl Lifecycle {
    /// Create a lifecycle manager.
    ///
    /// Every connection's close token is a child of `shutdown`.
    pub fn new(state: Arc<RelayState>, shutdown: CancellationToken, queue_capacity: usize) -> Self {
        Self {
            state,
            shutdown,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a freshly accepted connection. It starts without a room.
    pub async fn connect(&self) -> Session {
        let (tx, outbound) = mpsc::channel(self.queue_capacity);
        let handle = Arc::new(ConnectionHandle::new(tx, self.shutdown.child_token()));
        let id = self.state.register(Arc::clone(&handle)).await;

        info!(conn_id = %id, "Client connected");
        Session {
            id,
            handle,
            outbound,
        }
    }

    /// Tear down a connection after its transport closed or failed.
    ///
    /// Leaves the current room, tells the remaining members, prunes the room
    /// if it emptied, and unregisters the connection. Later calls for the
    /// same id do nothing.
    pub async fn disconnect(&self, id: ConnectionId) {
        let Some((handle, departure)) = self.state.remove(id).await else {
            return;
        };
        let dropped = handle.drop_count();

        match departure {
            Some(departure) => {
                info!(
                    conn_id = %id,
                    room_id = %departure.room,
                    remaining = departure.remaining.len(),
                    dropped,
                    "Client disconnected"
                );
                dispatcher::broadcast(
                    &departure.remaining,
                    &ServerMessage::user_disconnected(id),
                    Some(id),
                );
            }
            None => info!(conn_id = %id, dropped, "Client disconnected"),
        }
    }
}
