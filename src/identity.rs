//! Room names, user identifiers and the composite client identity.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the user and room parts of a [`ClientId`].
pub const CLIENT_ID_SEPARATOR: char = '@';

/// Upper case only: identifiers get copied around in links, which upper-case them.
const USER_ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const DEFAULT_USER_ID_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("room name must not be empty")]
    EmptyRoom,

    #[error("user id must not be empty")]
    EmptyUser,

    #[error("user id {0:?} contains the '@' separator")]
    SeparatorInUser(String),

    #[error("malformed client id {0:?}")]
    Malformed(String),
}

/// Name of a rendezvous room, the storage key of a `Room`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
    pub fn new(name: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IdentityError::EmptyRoom);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomName {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RoomName> for String {
    fn from(name: RoomName) -> Self {
        name.0
    }
}

/// Opaque identifier of one room occupant. Never contains [`CLIENT_ID_SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentityError::EmptyUser);
        }
        if id.contains(CLIENT_ID_SEPARATOR) {
            return Err(IdentityError::SeparatorInUser(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Address of one occupant's delivery session: `user@room` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId {
    pub room: RoomName,
    pub user: UserId,
}

impl ClientId {
    pub fn new(room: RoomName, user: UserId) -> Self {
        Self { room, user }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.user, CLIENT_ID_SEPARATOR, self.room)
    }
}

impl FromStr for ClientId {
    type Err = IdentityError;

    /// Splits on the first '@'; everything after it is the room name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user, room) = s
            .split_once(CLIENT_ID_SEPARATOR)
            .ok_or_else(|| IdentityError::Malformed(s.to_string()))?;
        Ok(Self {
            room: RoomName::new(room)?,
            user: UserId::new(user)?,
        })
    }
}

/// Source of fresh user identifiers handed out on join.
pub trait UserIdSource: Send {
    fn next_user_id(&mut self) -> UserId;
}

/// Fixed-length random upper-case alphanumeric identifiers.
///
/// Collisions are unlikely but not ruled out; the coordinator rejects a join
/// whose identifier already occupies the room.
pub struct RandomUserIds {
    rng: StdRng,
    len: usize,
}

impl RandomUserIds {
    pub fn new(len: usize) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            len: len.max(1),
        }
    }

    /// Deterministic sequence, for tests and benchmarks.
    pub fn seeded(seed: u64, len: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            len: len.max(1),
        }
    }
}

impl Default for RandomUserIds {
    fn default() -> Self {
        Self::new(DEFAULT_USER_ID_LEN)
    }
}

impl UserIdSource for RandomUserIds {
    fn next_user_id(&mut self) -> UserId {
        let id: String = (0..self.len)
            .map(|_| USER_ID_CHARS[self.rng.random_range(0..USER_ID_CHARS.len())] as char)
            .collect();
        UserId(id)
    }
}
