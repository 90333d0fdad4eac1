//! Startup bulk push of a backend's partition to the broker
//!
//! Rooms travel as `<room_id>,<count>\n` records packed into datagrams that
//! fit the broker's receive window. A record with an empty room id and the
//! value [`FINISH_STATUS`] terminates one backend's transfer.

use crate::config::{BackendDirectory, PartitionKey, MAX_DATA_SIZE};
use log::{info, warn};
use std::collections::{BTreeMap, HashMap};

/// Terminator value carried by the empty-room record
pub const FINISH_STATUS: u32 = 0;

/// Bytes kept free in every chunk; the terminator `,0` is appended to the
/// last chunk without overflowing the receive window
pub const CHUNK_MARGIN: usize = 3;

pub fn encode_record(room: &str, count: u32) -> String {
    format!("{},{}\n", room, count)
}

pub fn terminator() -> String {
    format!(",{}", FINISH_STATUS)
}

/// Packs a partition into datagram payloads, terminator included
///
/// Records are never split across datagrams; a record too long for any
/// datagram is left out. The result always holds at least one payload, the
/// last one ending with the terminator.
pub fn chunk_inventory<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, u32)>,
{
    let limit = MAX_DATA_SIZE - CHUNK_MARGIN;
    let mut chunks = Vec::new();
    let mut current = String::new();

    for (room, count) in records {
        let record = encode_record(room, count);
        if record.len() > limit {
            warn!(
                "Skipping room {:?}: its record of {} bytes does not fit in a datagram",
                room,
                record.len()
            );
            continue;
        }
        if current.len() + record.len() > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&record);
    }

    current.push_str(&terminator());
    chunks.push(current);
    chunks
}

/// A room as reported in a bulk push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushedRoom {
    pub partition: PartitionKey,
    pub count: u32,
}

/// What a single datagram did to the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Sender unknown or already finished; nothing recorded
    Ignored,
    /// Records stored, sender not finished yet
    Partial { records: usize },
    /// Sender's terminator seen
    Finished { partition: PartitionKey, records: usize },
}

/// Broker-side accumulator for the bulk pushes of every configured backend
///
/// Datagrams are attributed to a backend by source port. Anything from a
/// port outside the directory, or from a backend whose terminator has
/// already arrived, is ignored and does not advance completion.
#[derive(Debug)]
pub struct InventoryCollector {
    directory: BackendDirectory,
    finished: BTreeMap<u16, bool>,
    rooms: HashMap<String, PushedRoom>,
}

impl InventoryCollector {
    pub fn new(directory: &BackendDirectory) -> Self {
        Self {
            directory: directory.clone(),
            finished: directory.ports().map(|port| (port, false)).collect(),
            rooms: HashMap::new(),
        }
    }

    /// Records one datagram received from `port`
    pub fn ingest(&mut self, port: u16, payload: &str) -> Ingest {
        let partition = match (self.directory.key_of(port), self.finished.get(&port)) {
            (Some(partition), Some(false)) => partition,
            (Some(partition), _) => {
                warn!(
                    "Ignoring room status from Server {} after its transfer finished",
                    partition
                );
                return Ingest::Ignored;
            }
            (None, _) => {
                warn!("Ignoring room status from unexpected port {}", port);
                return Ingest::Ignored;
            }
        };

        let mut records = 0;
        for line in payload.lines().filter(|line| !line.is_empty()) {
            let Some((room, value)) = line.split_once(',') else {
                warn!("Skipping malformed room status {:?} from Server {}", line, partition);
                continue;
            };
            let count = match value.trim().parse::<u32>() {
                Ok(count) => count,
                Err(_) => {
                    warn!("Skipping malformed room status {:?} from Server {}", line, partition);
                    continue;
                }
            };

            if room.is_empty() && count == FINISH_STATUS {
                self.finished.insert(port, true);
                info!("Received the room status from Server {}", partition);
                return Ingest::Finished { partition, records };
            }

            self.rooms
                .insert(room.to_string(), PushedRoom { partition, count });
            records += 1;
        }

        Ingest::Partial { records }
    }

    /// True once every configured backend has sent its terminator
    pub fn is_complete(&self) -> bool {
        self.finished.values().all(|done| *done)
    }

    /// Backends still expected to finish
    pub fn pending(&self) -> Vec<PartitionKey> {
        self.finished
            .iter()
            .filter(|(_, done)| !**done)
            .filter_map(|(port, _)| self.directory.key_of(*port))
            .collect()
    }

    pub fn into_rooms(self) -> HashMap<String, PushedRoom> {
        self.rooms
    }
}
