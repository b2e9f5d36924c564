//! Live attendance gateway: WebSocket connections joining and leaving event rooms.

pub mod events;
pub mod fanout;
pub mod handler;
pub mod ids;
pub mod lifecycle;
pub mod registry;
pub mod rooms;
pub mod server;
