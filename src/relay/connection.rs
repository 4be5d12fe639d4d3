//! Per-connection identity and outbound handle
//!
//! A [`ConnectionHandle`] is the only way other workers reach a connection:
//! frames are pushed onto a bounded queue that the connection's own writer
//! task drains, so a slow socket never blocks the sender.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Opaque identifier of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Draw a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Sending side of a connection
pub struct ConnectionHandle {
    /// Queue drained by the connection's writer task
    tx: mpsc::Sender<Arc<str>>,
    /// Fires when the connection must shut down
    token: CancellationToken,
    /// Frames that could not be queued
    dropped_messages: AtomicU64,
}

impl ConnectionHandle {
    /// Create a handle over an outbound queue and a close token
    pub fn new(tx: mpsc::Sender<Arc<str>>, token: CancellationToken) -> Self {
        Self {
            tx,
            token,
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a serialized frame for delivery.
    ///
    /// Never waits. A full queue means the peer is not keeping up: the frame
    /// is dropped and the connection is closed. Returns `false` whenever the
    /// frame was not queued.
    pub fn send(&self, frame: Arc<str>) -> bool {
        if self.token.is_cancelled() {
            self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                warn!("Outbound queue full, closing slow connection");
                self.token.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Whether frames can still be delivered to this connection
    pub fn is_open(&self) -> bool {
        !self.token.is_cancelled() && !self.tx.is_closed()
    }

    /// Ask the connection to shut down
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Token that fires when the connection must shut down
    pub fn closed_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Total frames dropped for this connection
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }
}
