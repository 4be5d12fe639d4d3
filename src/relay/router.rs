//! Inbound frame routing
//!
//! A connection is either unjoined or joined to exactly one room; the
//! registry is the single record of which. Every frame from a connection is
//! routed to completion before its next frame is read.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::connection::ConnectionId;
use super::dispatcher;
use super::state::{JoinOutcome, RelayState};
use crate::server::{ClientMessage, ServerMessage, SignalTarget};

/// Routes parsed client frames to the dispatcher
#[derive(Clone)]
pub struct Router {
    state: Arc<RelayState>,
}

impl Router {
    /// Create a router over shared relay state
    pub fn new(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    /// Handle one raw text frame from `sender`.
    ///
    /// Malformed frames are logged and dropped; the connection stays open.
    pub async fn route(&self, sender: ConnectionId, text: &str) {
        match ClientMessage::from_json(text) {
            Ok(message) => self.dispatch(sender, message).await,
            Err(e) => warn!(conn_id = %sender, error = %e, "Dropping malformed frame"),
        }
    }

    /// Handle one parsed client message from `sender`
    pub async fn dispatch(&self, sender: ConnectionId, message: ClientMessage) {
        debug!(conn_id = %sender, kind = message.kind(), "Routing frame");

        match message {
            ClientMessage::Join { room_id } => self.handle_join(sender, &room_id).await,
            ClientMessage::Caption {
                room_id,
                text,
                timestamp,
            } => self.handle_caption(sender, &room_id, text, timestamp).await,
            ClientMessage::Signal { target, signal } => {
                self.handle_signal(sender, target, signal).await
            }
        }
    }

    async fn handle_join(&self, sender: ConnectionId, room_id: &str) {
        let Some(outcome) = self.state.join(sender, room_id).await else {
            debug!(conn_id = %sender, "Join from unregistered connection ignored");
            return;
        };

        match outcome {
            JoinOutcome::AlreadyMember => {
                debug!(conn_id = %sender, room_id, "Already in room");
            }
            JoinOutcome::Joined {
                left,
                created,
                members,
            } => {
                if let Some(departure) = left {
                    info!(conn_id = %sender, room_id = %departure.room, "Left room to switch rooms");
                    dispatcher::broadcast(
                        &departure.remaining,
                        &ServerMessage::user_disconnected(sender),
                        Some(sender),
                    );
                }

                info!(conn_id = %sender, room_id, created, members = members.len(), "Joined room");
                dispatcher::broadcast(
                    &members,
                    &ServerMessage::user_connected(sender),
                    Some(sender),
                );
            }
        }
    }

    async fn handle_caption(
        &self,
        sender: ConnectionId,
        room_id: &str,
        text: String,
        timestamp: Option<String>,
    ) {
        let Some((current, members)) = self.state.current_room(sender).await else {
            debug!(conn_id = %sender, "Caption before join dropped");
            return;
        };
        if current != room_id {
            debug!(conn_id = %sender, room_id, current_room = %current, "Caption for another room dropped");
            return;
        }

        debug!(conn_id = %sender, room_id, len = text.len(), "Caption");
        dispatcher::broadcast(
            &members,
            &ServerMessage::caption(text, timestamp, sender),
            Some(sender),
        );
    }

    async fn handle_signal(&self, sender: ConnectionId, target: SignalTarget, signal: Value) {
        let message = ServerMessage::signal(signal, sender);

        if target == SignalTarget::Broadcast {
            match self.state.current_room(sender).await {
                Some((room_id, members)) => {
                    debug!(conn_id = %sender, %room_id, "Broadcast signal");
                    dispatcher::broadcast(&members, &message, Some(sender));
                }
                None => debug!(conn_id = %sender, "Broadcast signal before join dropped"),
            }
            return;
        }

        let Some(target_id) = target.peer_id() else {
            debug!(conn_id = %sender, ?target, "Signal target is not a connection id");
            return;
        };
        match self.state.lookup(target_id).await {
            Some(handle) => {
                if dispatcher::direct(&handle, &message) {
                    debug!(conn_id = %sender, target = %target_id, "Direct signal");
                } else {
                    debug!(conn_id = %sender, target = %target_id, "Signal target closed");
                }
            }
            None => debug!(conn_id = %sender, target = %target_id, "Signal target not connected"),
        }
    }
}
