use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delivery::SessionToken;
use crate::identity::{RoomName, UserId};

/// Messages sent from client to server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join (or create) a room; answered with `joined`
    #[serde(rename = "join")]
    Join { room: RoomName },

    /// Attach this connection to the session issued on join
    #[serde(rename = "connect")]
    Connect { token: SessionToken },

    /// Signaling data for the other occupant, relayed as is
    #[serde(rename = "message")]
    Message { data: Value },

    /// Leave the room but keep the connection open
    #[serde(rename = "leave")]
    Leave,
}

/// Replies sent from server to client.
///
/// Pushed status notices and relayed data travel as
/// [`Payload`](crate::delivery::Payload) frames instead.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Joined successfully; connect with `token` to start receiving
    #[serde(rename = "joined")]
    Joined {
        room: RoomName,
        user: UserId,
        token: SessionToken,
    },

    /// Error response
    #[serde(rename = "error")]
    Error { message: String },
}
