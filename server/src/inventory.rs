//! A backend's authoritative room partition
//!
//! Only the owning backend's serving loop touches an [`Inventory`], so the
//! decrement on reservation needs no locking.

use log::warn;
use shared::protocol::RoomStatus;
use shared::DataSourceError;
use std::collections::HashMap;
use std::path::Path;

/// Result of trying to reserve one room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Reserved { remaining: u32 },
    Unavailable,
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    rooms: HashMap<String, u32>,
}

impl Inventory {
    /// Reads `room,count` lines from a partition file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DataSourceError> {
        let path = path.as_ref();
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| DataSourceError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })?;
        Ok(Self::parse(&contents))
    }

    /// Parses partition file contents; blank and malformed lines are skipped
    pub fn parse(contents: &str) -> Self {
        let mut rooms = HashMap::new();

        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parsed = line
                .split_once(',')
                .and_then(|(room, count)| Some((room.trim(), count.trim().parse::<u32>().ok()?)))
                .filter(|(room, _)| !room.is_empty());

            match parsed {
                Some((room, count)) => {
                    rooms.insert(room.to_string(), count);
                }
                None => warn!("Skipping malformed room record on line {}: {:?}", number + 1, line),
            }
        }

        Self { rooms }
    }

    pub fn from_records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            rooms: records
                .into_iter()
                .map(|(room, count)| (room.into(), count))
                .collect(),
        }
    }

    /// Availability never changes the inventory
    pub fn availability(&self, room: &str) -> RoomStatus {
        match self.rooms.get(room) {
            None => RoomStatus::NotFound,
            Some(count) if *count > 0 => RoomStatus::Available,
            Some(_) => RoomStatus::NotAvailable,
        }
    }

    /// Takes one unit of `room` if any is left; counts never go below zero
    pub fn reserve(&mut self, room: &str) -> Reservation {
        match self.rooms.get_mut(room) {
            None => Reservation::NotFound,
            Some(count) if *count > 0 => {
                *count -= 1;
                Reservation::Reserved { remaining: *count }
            }
            Some(_) => Reservation::Unavailable,
        }
    }

    pub fn count(&self, room: &str) -> Option<u32> {
        self.rooms.get(room).copied()
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, u32)> {
        self.rooms.iter().map(|(room, count)| (room.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
