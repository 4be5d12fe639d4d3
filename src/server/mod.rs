//! HTTP and WebSocket server module
//!
//! Accepts browser connections, speaks the JSON frame protocol and exposes
//! the status query.

#[allow(dead_code)]
mod protocol;
mod status;
mod websocket;

pub use protocol::*;
pub use websocket::RelayServer;
