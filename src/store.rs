//! Durable room storage keyed by room name.
//!
//! Writes are last-writer-wins; nothing here detects a concurrent update.
//! The coordinator actor is the only writer, which is what keeps
//! read-modify-write sequences consistent.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::identity::RoomName;
use crate::room::Room;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Expected outcome: the room has to be created.
    #[error("room not found: {0}")]
    NotFound(RoomName),

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt room state: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait RoomStore: Send {
    fn get(&self, name: &RoomName) -> Result<Room, StoreError>;

    /// Stores `room` under its own name, replacing any previous record.
    fn put(&self, room: &Room) -> Result<(), StoreError>;

    /// Deleting an absent room succeeds.
    fn delete(&self, name: &RoomName) -> Result<(), StoreError>;
}

/// Process-local store. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRoomStore {
    rooms: Mutex<HashMap<RoomName, Room>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms().is_empty()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<RoomName, Room>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RoomStore for MemoryRoomStore {
    fn get(&self, name: &RoomName) -> Result<Room, StoreError> {
        self.rooms()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.clone()))
    }

    fn put(&self, room: &Room) -> Result<(), StoreError> {
        self.rooms().insert(room.name().clone(), room.clone());
        Ok(())
    }

    fn delete(&self, name: &RoomName) -> Result<(), StoreError> {
        self.rooms().remove(name);
        Ok(())
    }
}

/// Keeps every room in a single JSON file, reloaded on each call so the
/// table survives restarts.
#[derive(Debug)]
pub struct JsonFileRoomStore {
    path: PathBuf,
}

type RoomTable = BTreeMap<RoomName, Room>;

impl JsonFileRoomStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<RoomTable, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("State file {} missing, starting empty", self.path.display());
                Ok(RoomTable::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a sibling temp file first so a crash never leaves a torn file.
    fn save(&self, table: &RoomTable) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(table)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RoomStore for JsonFileRoomStore {
    fn get(&self, name: &RoomName) -> Result<Room, StoreError> {
        self.load()?
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))
    }

    fn put(&self, room: &Room) -> Result<(), StoreError> {
        let mut table = self.load()?;
        table.insert(room.name().clone(), room.clone());
        self.save(&table)
    }

    fn delete(&self, name: &RoomName) -> Result<(), StoreError> {
        let mut table = self.load()?;
        if table.remove(name).is_some() {
            self.save(&table)?;
        }
        Ok(())
    }
}
