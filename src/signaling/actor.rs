use std::fmt;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::coordinator::{Coordinator, JoinTicket, SignalingError};
use crate::delivery::DeliveryChannel;
use crate::identity::RoomName;
use crate::store::RoomStore;

pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

type Reply<T> = oneshot::Sender<Result<T, SignalingError>>;

/// Commands sent to the coordinator actor
pub(crate) enum RoomCommand {
    Join {
        room: RoomName,
        reply: Reply<JoinTicket>,
    },
    Connected {
        client: String,
        reply: Reply<()>,
    },
    Disconnected {
        client: String,
        reply: Reply<()>,
    },
    Relay {
        client: String,
        data: Value,
        reply: Reply<()>,
    },
}

/// Owns the coordinator and applies commands one at a time, so the
/// get-modify-put of one event never interleaves with another.
pub(crate) async fn coordinator_actor<S, D>(
    mut coordinator: Coordinator<S, D>,
    mut rx: mpsc::Receiver<RoomCommand>,
) where
    S: RoomStore,
    D: DeliveryChannel,
{
    while let Some(cmd) = rx.recv().await {
        match cmd {
            RoomCommand::Join { room, reply } => {
                let _ = reply.send(coordinator.join(room));
            }
            RoomCommand::Connected { client, reply } => {
                let _ = reply.send(coordinator.peer_connected(&client));
            }
            RoomCommand::Disconnected { client, reply } => {
                let _ = reply.send(coordinator.peer_disconnected(&client));
            }
            RoomCommand::Relay {
                client,
                data,
                reply,
            } => {
                let _ = reply.send(coordinator.relay_message(&client, data));
            }
        }
    }
    info!("Coordinator actor stopped");
}

/// Handle to communicate with the coordinator actor
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<RoomCommand>,
}

impl CoordinatorHandle {
    /// Spawns the actor on the current runtime. It stops once every handle
    /// is dropped.
    pub fn spawn<S, D>(coordinator: Coordinator<S, D>, queue_depth: usize) -> Self
    where
        S: RoomStore + 'static,
        D: DeliveryChannel + 'static,
    {
        let (tx, rx) = mpsc::channel::<RoomCommand>(queue_depth.max(1));
        tokio::spawn(coordinator_actor(coordinator, rx));
        debug!("Coordinator actor started");
        Self { tx }
    }

    /// Join a room under a new user id; the ticket carries the session token
    pub async fn join(&self, room: RoomName) -> Result<JoinTicket, SignalingError> {
        self.request(|reply| RoomCommand::Join { room, reply }).await
    }

    /// `client` is anything that displays as the `user@room` wire form
    pub async fn peer_connected(&self, client: impl fmt::Display) -> Result<(), SignalingError> {
        let client = client.to_string();
        self.request(|reply| RoomCommand::Connected { client, reply })
            .await
    }

    pub async fn peer_disconnected(
        &self,
        client: impl fmt::Display,
    ) -> Result<(), SignalingError> {
        let client = client.to_string();
        self.request(|reply| RoomCommand::Disconnected { client, reply })
            .await
    }

    /// Relay opaque signaling data to the sender's peer
    pub async fn relay_message(
        &self,
        client: impl fmt::Display,
        data: Value,
    ) -> Result<(), SignalingError> {
        let client = client.to_string();
        self.request(|reply| RoomCommand::Relay {
            client,
            data,
            reply,
        })
        .await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::ChannelHub;
    use crate::identity::RandomUserIds;
    use crate::store::MemoryRoomStore;

    fn handle() -> CoordinatorHandle {
        let coordinator = Coordinator::new(
            MemoryRoomStore::new(),
            ChannelHub::new(),
            Box::new(RandomUserIds::seeded(3, 10)),
        );
        CoordinatorHandle::spawn(coordinator, 16)
    }

    fn alpha() -> RoomName {
        RoomName::new("alpha").unwrap()
    }

    #[tokio::test]
    async fn concurrent_joins_never_overfill_a_room() {
        let handle = handle();
        let joins: Vec<_> = (0..10)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.join(alpha()).await })
            })
            .collect();

        let mut joined = 0;
        let mut full = 0;
        for join in joins {
            match join.await.unwrap() {
                Ok(_) => joined += 1,
                Err(SignalingError::RoomFull(_)) => full += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(joined, 2);
        assert_eq!(full, 8);
    }

    #[tokio::test]
    async fn handle_round_trips_every_event() {
        let handle = handle();
        let a = handle.join(alpha()).await.unwrap();
        let b = handle.join(alpha()).await.unwrap();

        handle.peer_connected(&a.client).await.unwrap();
        handle
            .relay_message(&a.client, serde_json::json!({"sdp": "x"}))
            .await
            .unwrap();
        handle.peer_disconnected(&a.client).await.unwrap();
        handle.peer_disconnected(&b.client).await.unwrap();

        // room is gone, so further events for it fail
        assert!(matches!(
            handle.peer_connected(&b.client).await,
            Err(SignalingError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn malformed_identity_is_reported() {
        let handle = handle();
        assert!(matches!(
            handle.peer_disconnected("nonsense").await,
            Err(SignalingError::InvalidClientId(_))
        ));
    }
}
