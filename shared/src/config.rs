//! Well-known ports, transfer limits and the partition routing table
//!
//! Ports are fixed for the deployed binaries but every component takes them
//! at construction time, so tests can run whole systems on ephemeral ports.

use std::collections::BTreeMap;
use std::fmt;

pub const SERVER_S_PORT: u16 = 41626;
pub const SERVER_D_PORT: u16 = 42626;
pub const SERVER_U_PORT: u16 = 43626;
pub const BROKER_BACKEND_PORT: u16 = 44626;
pub const BROKER_CLIENT_PORT: u16 = 45626;

/// Largest single transfer, in bytes, for both stream and datagram traffic
pub const MAX_DATA_SIZE: usize = 1024;

/// Pending-connection queue length for listening transports
pub const LISTEN_BACKLOG: i32 = 10;

/// Every peer in the system lives on this host
pub const LOOPBACK_HOST: &str = "localhost";

/// Identifies a backend partition; a room belongs to the partition named by
/// its first character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(char);

impl PartitionKey {
    pub const fn new(name: char) -> Self {
        Self(name)
    }

    /// Derives the owning partition of a room, `None` for an empty room id
    pub fn of_room(room: &str) -> Option<Self> {
        room.chars().next().map(Self)
    }

    pub const fn as_char(self) -> char {
        self.0
    }

    /// Inventory file a backend reads when none is given explicitly
    pub fn default_inventory_file(self) -> String {
        match self.0 {
            'S' => "single.txt".to_string(),
            'D' => "double.txt".to_string(),
            'U' => "suite.txt".to_string(),
            other => format!("{}.txt", other.to_ascii_lowercase()),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bidirectional routing table between partitions and backend ports
///
/// The broker routes requests by partition key and correlates datagrams by
/// source port, so both directions are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDirectory {
    by_key: BTreeMap<PartitionKey, u16>,
    by_port: BTreeMap<u16, PartitionKey>,
}

impl BackendDirectory {
    /// Creates an empty directory
    pub fn new() -> Self {
        Self {
            by_key: BTreeMap::new(),
            by_port: BTreeMap::new(),
        }
    }

    /// Registers a backend, replacing any previous entry for the same key
    pub fn insert(&mut self, key: PartitionKey, port: u16) {
        if let Some(old_port) = self.by_key.insert(key, port) {
            self.by_port.remove(&old_port);
        }
        self.by_port.insert(port, key);
    }

    pub fn with_backend(mut self, key: PartitionKey, port: u16) -> Self {
        self.insert(key, port);
        self
    }

    pub fn port_of(&self, key: PartitionKey) -> Option<u16> {
        self.by_key.get(&key).copied()
    }

    pub fn key_of(&self, port: u16) -> Option<PartitionKey> {
        self.by_port.get(&port).copied()
    }

    /// Resolves the backend owning `room`
    ///
    /// Returns `None` for an empty room id or an unknown partition.
    pub fn route(&self, room: &str) -> Option<(PartitionKey, u16)> {
        let key = PartitionKey::of_room(room)?;
        self.port_of(key).map(|port| (key, port))
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.by_port.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PartitionKey, u16)> + '_ {
        self.by_key.iter().map(|(key, port)| (*key, *port))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl Default for BackendDirectory {
    fn default() -> Self {
        Self::new()
            .with_backend(PartitionKey::new('S'), SERVER_S_PORT)
            .with_backend(PartitionKey::new('D'), SERVER_D_PORT)
            .with_backend(PartitionKey::new('U'), SERVER_U_PORT)
    }
}

/// The broker's two listening ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerPorts {
    /// Datagram port facing the backends
    pub backend: u16,
    /// Stream port facing the clients
    pub client: u16,
}

impl Default for BrokerPorts {
    fn default() -> Self {
        Self {
            backend: BROKER_BACKEND_PORT,
            client: BROKER_CLIENT_PORT,
        }
    }
}
