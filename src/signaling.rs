//! WebSocket front end: turns client frames into coordinator events

mod actor;
mod messages;
mod server;

pub use actor::{CoordinatorHandle, DEFAULT_QUEUE_DEPTH};
pub use messages::{ClientMessage, ServerMessage};
pub use server::{
    DEFAULT_PING_INTERVAL, DEFAULT_PONG_TIMEOUT, DEFAULT_SIGNALING_PORT, Liveness,
    SignalingServer,
};
