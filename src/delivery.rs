//! Push delivery to live client sessions.
//!
//! A session is addressed by its [`ClientId`]. The coordinator opens a token
//! on join; the client's connection later attaches with that token and from
//! then on receives every [`Payload`] sent to its address.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tracing::debug;

use crate::identity::ClientId;

const TOKEN_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("client {0} is not attached")]
    NotAttached(ClientId),

    #[error("session of client {0} is closed")]
    Closed(ClientId),

    #[error("unknown session token")]
    UnknownToken,

    #[error("could not encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Opaque token a client presents to attach to its delivery session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        let token = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Presence notice pushed to room occupants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    Connected,
    Disconnected,
}

/// Everything pushed to a client. Serializes directly as the wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Status { status: PeerStatus },
    /// Relayed signaling data; never inspected.
    Message { data: serde_json::Value },
}

impl Payload {
    pub fn encode(&self) -> Result<OutboundMessage, DeliveryError> {
        Ok(OutboundMessage::from(serde_json::to_string(self)?))
    }
}

impl From<PeerStatus> for Payload {
    fn from(status: PeerStatus) -> Self {
        Payload::Status { status }
    }
}

/// Wrapper for outbound WebSocket text using tungstenite's Utf8Bytes,
/// so a frame can be cloned without copying.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}

pub trait DeliveryChannel: Send {
    /// Issues the token `client` uses to attach. Replaces any earlier token
    /// for the same address.
    fn open(&self, client: &ClientId) -> Result<SessionToken, DeliveryError>;

    /// Best-effort push. Fails when nobody is attached at `client`.
    fn send(&self, client: &ClientId, payload: &Payload) -> Result<(), DeliveryError>;
}

#[derive(Debug, Default)]
struct HubState {
    tokens: HashMap<SessionToken, ClientId>,
    issued: HashMap<ClientId, SessionToken>,
    sessions: HashMap<ClientId, mpsc::UnboundedSender<OutboundMessage>>,
}

/// In-process delivery channel shared by the coordinator and the
/// WebSocket connections. Cloning shares the same sessions.
#[derive(Debug, Clone, Default)]
pub struct ChannelHub {
    state: Arc<Mutex<HubState>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The address a token was issued for.
    pub fn lookup(&self, token: &SessionToken) -> Result<ClientId, DeliveryError> {
        self.state()
            .tokens
            .get(token)
            .cloned()
            .ok_or(DeliveryError::UnknownToken)
    }

    /// Binds a live session to the address the token was issued for.
    /// A second attach with the same token replaces the first session.
    pub fn attach(
        &self,
        token: &SessionToken,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<ClientId, DeliveryError> {
        let mut state = self.state();
        let client = state
            .tokens
            .get(token)
            .cloned()
            .ok_or(DeliveryError::UnknownToken)?;
        state.sessions.insert(client.clone(), tx);
        debug!("Session attached for {}", client);
        Ok(client)
    }

    /// Drops the session and revokes its token.
    pub fn detach(&self, client: &ClientId) {
        let mut state = self.state();
        state.sessions.remove(client);
        if let Some(token) = state.issued.remove(client) {
            state.tokens.remove(&token);
        }
        debug!("Session detached for {}", client);
    }

    pub fn is_attached(&self, client: &ClientId) -> bool {
        self.state().sessions.contains_key(client)
    }
}

impl DeliveryChannel for ChannelHub {
    fn open(&self, client: &ClientId) -> Result<SessionToken, DeliveryError> {
        let token = SessionToken::generate();
        let mut state = self.state();
        if let Some(old) = state.issued.insert(client.clone(), token.clone()) {
            state.tokens.remove(&old);
        }
        state.tokens.insert(token.clone(), client.clone());
        Ok(token)
    }

    fn send(&self, client: &ClientId, payload: &Payload) -> Result<(), DeliveryError> {
        let msg = payload.encode()?;
        let mut state = self.state();
        let tx = state
            .sessions
            .get(client)
            .ok_or_else(|| DeliveryError::NotAttached(client.clone()))?;
        if tx.send(msg).is_err() {
            state.sessions.remove(client);
            return Err(DeliveryError::Closed(client.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{RoomName, UserId};
    use serde_json::json;

    fn client(user: &str) -> ClientId {
        ClientId::new(RoomName::new("alpha").unwrap(), UserId::new(user).unwrap())
    }

    #[test]
    fn tokens_are_random_alphanumeric() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_eq!(a.as_str().len(), TOKEN_LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn payload_wire_format() {
        let status = Payload::from(PeerStatus::Connected);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"type": "status", "status": "connected"})
        );

        let relay = Payload::Message {
            data: json!({"type": "offer", "sdp": "v=0"}),
        };
        assert_eq!(
            serde_json::to_value(&relay).unwrap(),
            json!({"type": "message", "data": {"type": "offer", "sdp": "v=0"}})
        );
    }

    #[test]
    fn send_reaches_attached_session() {
        let hub = ChannelHub::new();
        let token = hub.open(&client("U1")).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(hub.lookup(&token).unwrap(), client("U1"));
        assert!(!hub.is_attached(&client("U1")));
        assert_eq!(hub.attach(&token, tx).unwrap(), client("U1"));
        assert!(hub.is_attached(&client("U1")));

        hub.send(&client("U1"), &PeerStatus::Disconnected.into()).unwrap();
        let frame = rx.try_recv().unwrap();
        let back: Payload = serde_json::from_str(frame.as_str()).unwrap();
        assert_eq!(back, Payload::from(PeerStatus::Disconnected));
    }

    #[test]
    fn send_to_unattached_client_fails() {
        let hub = ChannelHub::new();
        hub.open(&client("U1")).unwrap();
        assert!(matches!(
            hub.send(&client("U1"), &PeerStatus::Connected.into()),
            Err(DeliveryError::NotAttached(_))
        ));
    }

    #[test]
    fn send_to_dropped_session_fails_and_forgets_it() {
        let hub = ChannelHub::new();
        let token = hub.open(&client("U1")).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.attach(&token, tx).unwrap();
        drop(rx);

        assert!(matches!(
            hub.send(&client("U1"), &PeerStatus::Connected.into()),
            Err(DeliveryError::Closed(_))
        ));
        assert!(!hub.is_attached(&client("U1")));
    }

    #[test]
    fn reopen_replaces_token() {
        let hub = ChannelHub::new();
        let first = hub.open(&client("U1")).unwrap();
        let second = hub.open(&client("U1")).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            hub.attach(&first, tx.clone()),
            Err(DeliveryError::UnknownToken)
        ));
        assert_eq!(hub.attach(&second, tx).unwrap(), client("U1"));
    }

    #[test]
    fn detach_revokes_token() {
        let hub = ChannelHub::new();
        let token = hub.open(&client("U1")).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.attach(&token, tx.clone()).unwrap();

        hub.detach(&client("U1"));
        assert!(!hub.is_attached(&client("U1")));
        assert!(matches!(
            hub.attach(&token, tx),
            Err(DeliveryError::UnknownToken)
        ));
    }
}
