//! Broker-side view of room counts
//!
//! Filled from the backends' bulk pushes at startup and afterwards changed
//! only by successful reservations. Every connection handler works on its own
//! copy, so handlers can disagree until each one hears a fresh count from the
//! owning backend. Nothing reconciles a copy if a backend reply is lost after
//! the backend already committed the decrement.

use shared::bulk::PushedRoom;
use shared::PartitionKey;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedRoom {
    pub partition: PartitionKey,
    pub count: u32,
}

impl From<PushedRoom> for CachedRoom {
    fn from(pushed: PushedRoom) -> Self {
        Self {
            partition: pushed.partition,
            count: pushed.count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomCache {
    rooms: HashMap<String, CachedRoom>,
}

impl RoomCache {
    pub fn from_pushed(rooms: HashMap<String, PushedRoom>) -> Self {
        Self {
            rooms: rooms
                .into_iter()
                .map(|(room, pushed)| (room, pushed.into()))
                .collect(),
        }
    }

    pub fn get(&self, room: &str) -> Option<CachedRoom> {
        self.rooms.get(room).copied()
    }

    /// Stores the count a backend reported after a successful reservation
    ///
    /// A room missing from the cache is added under the partition its id
    /// routes to.
    pub fn record_reservation(&mut self, room: &str, count: u32) {
        match self.rooms.get_mut(room) {
            Some(cached) => cached.count = count,
            None => {
                if let Some(partition) = PartitionKey::of_room(room) {
                    self.rooms
                        .insert(room.to_string(), CachedRoom { partition, count });
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, CachedRoom)> {
        self.rooms.iter().map(|(room, cached)| (room.as_str(), *cached))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
