//! Signaling coordinator: applies join, connect, disconnect and relay events
//! to stored rooms and notifies the other occupant.
//!
//! Each call is one read-modify-write against the [`RoomStore`]. The
//! coordinator does no locking of its own; run it behind the signaling actor
//! so events on a room never interleave.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::delivery::{DeliveryChannel, DeliveryError, Payload, PeerStatus, SessionToken};
use crate::identity::{ClientId, IdentityError, RoomName, UserId, UserIdSource};
use crate::room::{Room, RoomPhase};
use crate::store::{RoomStore, StoreError};

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("room {0} is full")]
    RoomFull(RoomName),

    #[error("room not found: {0}")]
    RoomNotFound(RoomName),

    #[error("{0} is not an occupant of its room")]
    NotAnOccupant(ClientId),

    #[error("user {user} is already in room {room}")]
    AlreadyJoined { room: RoomName, user: UserId },

    #[error("invalid client id: {0}")]
    InvalidClientId(#[from] IdentityError),

    #[error("storage error: {0}")]
    Storage(StoreError),

    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for SignalingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(name) => SignalingError::RoomNotFound(name),
            other => SignalingError::Storage(other),
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinTicket {
    pub client: ClientId,
    pub token: SessionToken,
    pub phase: RoomPhase,
}

pub struct Coordinator<S, D> {
    store: S,
    channel: D,
    ids: Box<dyn UserIdSource>,
}

impl<S: RoomStore, D: DeliveryChannel> Coordinator<S, D> {
    pub fn new(store: S, channel: D, ids: Box<dyn UserIdSource>) -> Self {
        Self {
            store,
            channel,
            ids,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn channel(&self) -> &D {
        &self.channel
    }

    /// Joins `room` under a freshly generated user id.
    pub fn join(&mut self, room: RoomName) -> Result<JoinTicket, SignalingError> {
        let user = self.ids.next_user_id();
        self.join_as(room, user)
    }

    pub fn join_as(&mut self, name: RoomName, user: UserId) -> Result<JoinTicket, SignalingError> {
        let room = match self.store.get(&name) {
            Ok(room) => {
                if room.contains(&user) {
                    return Err(SignalingError::AlreadyJoined { room: name, user });
                }
                if room.occupancy() >= 2 {
                    warn!(room = %name, "Room full, rejecting join");
                    return Err(SignalingError::RoomFull(name));
                }
                let mut room = room;
                room.add_occupant(user.clone());
                info!(room = %name, user = %user, "Joined room");
                room
            }
            Err(StoreError::NotFound(_)) => {
                let mut room = Room::new(name.clone());
                room.add_occupant(user.clone());
                info!(room = %name, user = %user, "Created room");
                room
            }
            Err(e) => {
                error!(room = %name, "Could not load room: {}", e);
                return Err(SignalingError::Storage(e));
            }
        };

        self.store.put(&room).inspect_err(|e| {
            error!(room = %name, "Could not save room: {}", e);
        })?;

        let client = ClientId::new(name, user);
        let token = self.channel.open(&client)?;
        let phase = room.phase().unwrap_or(RoomPhase::WaitingForPeer);
        Ok(JoinTicket {
            client,
            token,
            phase,
        })
    }

    /// `client` is the wire form `user@room` carried by the notification.
    pub fn peer_connected(&self, client: &str) -> Result<(), SignalingError> {
        let client: ClientId = client.parse()?;
        let mut room = self.load(&client.room)?;

        if !room.contains(&client.user) {
            debug!(%client, "Connect notification for a user not in the room");
            return Err(SignalingError::NotAnOccupant(client));
        }

        room.mark_connected(&client.user);
        self.save(&room)?;
        info!(%client, "Peer connected");

        self.notify(&room, &client, PeerStatus::Connected, room.other_occupant(&client.user));
        Ok(())
    }

    pub fn peer_disconnected(&self, client: &str) -> Result<(), SignalingError> {
        let client: ClientId = client.parse()?;
        let mut room = self.load(&client.room)?;

        if !room.contains(&client.user) {
            debug!(%client, "Disconnect for a user not in the room, ignoring");
            return Ok(());
        }

        // resolve before removal, afterwards the user has no "other"
        let other = room.other_occupant(&client.user).cloned();

        if room.remove_occupant(&client.user) {
            self.store.delete(&client.room).inspect_err(|e| {
                error!(room = %client.room, "Could not delete room: {}", e);
            })?;
            info!(room = %client.room, "Room removed (empty)");
            return Ok(());
        }

        self.save(&room)?;
        info!(%client, "Peer disconnected");
        self.notify(&room, &client, PeerStatus::Disconnected, other.as_ref());
        Ok(())
    }

    /// Forwards `data` untouched to the other occupant of the sender's room.
    pub fn relay_message(&self, client: &str, data: Value) -> Result<(), SignalingError> {
        let client: ClientId = client.parse()?;
        let room = self.load(&client.room)?;

        let Some(other) = room.other_occupant(&client.user) else {
            debug!(%client, "No peer to relay to");
            return Ok(());
        };

        let to = ClientId::new(client.room.clone(), other.clone());
        debug!(from = %client, %to, "Relaying message");
        self.deliver(&to, &Payload::Message { data });
        Ok(())
    }

    fn load(&self, name: &RoomName) -> Result<Room, SignalingError> {
        self.store.get(name).map_err(|e| {
            error!(room = %name, "Could not get room: {}", e);
            SignalingError::from(e)
        })
    }

    fn save(&self, room: &Room) -> Result<(), SignalingError> {
        self.store.put(room).map_err(|e| {
            error!(room = %room.name(), "Could not put room: {}", e);
            SignalingError::Storage(e)
        })
    }

    /// Sends `status` to the other occupant and to `client` itself. Each send
    /// stands alone; failures are logged and dropped.
    fn notify(&self, room: &Room, client: &ClientId, status: PeerStatus, other: Option<&UserId>) {
        let payload = Payload::from(status);
        if let Some(other) = other {
            self.deliver(&ClientId::new(room.name().clone(), other.clone()), &payload);
        }
        self.deliver(client, &payload);
    }

    fn deliver(&self, to: &ClientId, payload: &Payload) {
        if let Err(e) = self.channel.send(to, payload) {
            warn!(client = %to, "Delivery failed: {}", e);
        }
    }
}
