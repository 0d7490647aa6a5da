//! Pairing state of a single room.
//!
//! A [`Room`] holds two occupant slots. All transitions here are pure; the
//! coordinator decides when to persist or delete the result.

use serde::{Deserialize, Serialize};

use crate::identity::{RoomName, UserId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Slot {
    occupant: Option<UserId>,
    connected: bool,
}

impl Slot {
    fn holds(&self, user: &UserId) -> bool {
        self.occupant.as_ref() == Some(user)
    }

    fn clear(&mut self) {
        self.occupant = None;
        self.connected = false;
    }
}

/// Occupancy phase of a stored room. An absent room has no phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    WaitingForPeer,
    Paired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    name: RoomName,
    slots: [Slot; 2],
}

impl Room {
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            slots: Default::default(),
        }
    }

    pub fn name(&self) -> &RoomName {
        &self.name
    }

    /// Fills the first empty slot. Does nothing when the room is full;
    /// callers check [`Room::occupancy`] first.
    pub fn add_occupant(&mut self, user: UserId) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.occupant.is_none()) {
            slot.occupant = Some(user);
        }
    }

    pub fn occupancy(&self) -> usize {
        self.slots.iter().filter(|s| s.occupant.is_some()).count()
    }

    /// Returns `None` for an empty room; the store never holds one.
    pub fn phase(&self) -> Option<RoomPhase> {
        match self.occupancy() {
            0 => None,
            1 => Some(RoomPhase::WaitingForPeer),
            _ => Some(RoomPhase::Paired),
        }
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.slots.iter().any(|s| s.holds(user))
    }

    pub fn occupants(&self) -> impl Iterator<Item = &UserId> {
        self.slots.iter().filter_map(|s| s.occupant.as_ref())
    }

    /// The occupant of the slot not held by `user`.
    ///
    /// `None` if `user` is not in the room, or if the other slot is empty.
    pub fn other_occupant(&self, user: &UserId) -> Option<&UserId> {
        let [a, b] = &self.slots;
        if b.holds(user) {
            a.occupant.as_ref()
        } else if a.holds(user) {
            b.occupant.as_ref()
        } else {
            None
        }
    }

    pub fn mark_connected(&mut self, user: &UserId) {
        for slot in self.slots.iter_mut().filter(|s| s.holds(user)) {
            slot.connected = true;
        }
    }

    pub fn is_connected(&self, user: &UserId) -> bool {
        self.slots.iter().any(|s| s.holds(user) && s.connected)
    }

    /// Clears the slot held by `user`. Returns true when the room is now
    /// empty and must be deleted rather than stored.
    pub fn remove_occupant(&mut self, user: &UserId) -> bool {
        for slot in self.slots.iter_mut().filter(|s| s.holds(user)) {
            slot.clear();
        }
        self.occupancy() == 0
    }
}
