//! `/api/status` endpoint.

use serde::Serialize;

use crate::relay::Stats;

/// Status response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Always `"Online"` while the relay is serving.
    pub status: &'static str,
    /// Registered connections, joined or not.
    pub active_users: usize,
    /// Rooms with at least one member.
    pub active_rooms: usize,
}

impl From<Stats> for StatusResponse {
    fn from(stats: Stats) -> Self {
        Self {
            status: "Online",
            active_users: stats.active_users,
            active_rooms: stats.active_rooms,
        }
    }
}
