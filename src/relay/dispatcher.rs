//! Broadcast and direct delivery
//!
//! Frames are serialized once and pushed onto each recipient's outbound
//! queue. Nothing here touches the shared state lock or waits on a socket.

use std::sync::Arc;

use tracing::{debug, warn};

use super::connection::{ConnectionHandle, ConnectionId};
use super::state::Member;
use crate::server::ServerMessage;

fn encode(message: &ServerMessage) -> Option<Arc<str>> {
    match message.to_json() {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(kind = message.kind(), error = %e, "Failed to serialize outbound message");
            None
        }
    }
}

/// Deliver a message to every member except `exclude`.
///
/// Returns the number of recipients the frame was queued for.
pub fn broadcast(members: &[Member], message: &ServerMessage, exclude: Option<ConnectionId>) -> usize {
    let Some(frame) = encode(message) else {
        return 0;
    };

    let mut delivered = 0;
    for member in members.iter().filter(|m| Some(m.id) != exclude) {
        if member.handle.send(Arc::clone(&frame)) {
            delivered += 1;
        } else {
            debug!(conn_id = %member.id, kind = message.kind(), "Dropped frame for closed or slow connection");
        }
    }

    debug!(kind = message.kind(), recipients = delivered, "Broadcast message");
    delivered
}

/// Deliver a message to a single connection if it is still open.
pub fn direct(recipient: &ConnectionHandle, message: &ServerMessage) -> bool {
    if !recipient.is_open() {
        return false;
    }
    match encode(message) {
        Some(frame) => recipient.send(frame),
        None => false,
    }
}
