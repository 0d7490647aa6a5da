//! Two-party rendezvous and signaling relay.
//!
//! Two clients join a named room, attach to their delivery sessions, and
//! exchange opaque signaling payloads through the server.

pub mod config;
pub mod coordinator;
pub mod delivery;
pub mod identity;
pub mod room;
pub mod signaling;
pub mod store;

pub use coordinator::{Coordinator, JoinTicket, SignalingError};
pub use delivery::{ChannelHub, DeliveryChannel, Payload, PeerStatus, SessionToken};
pub use identity::{ClientId, RandomUserIds, RoomName, UserId};
pub use room::{Room, RoomPhase};
pub use store::{JsonFileRoomStore, MemoryRoomStore, RoomStore, StoreError};
