//! Loopback address resolution
//!
//! A resolution yields an ordered list of candidates; callers walk it and
//! keep the first one their operation succeeds on.

use crate::config::LOOPBACK_HOST;
use crate::error::AddressError;
use log::debug;
use std::fmt;
use std::net::SocketAddr;
use tokio::net::lookup_host;

/// Socket flavour an address is resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    /// Connection-oriented (TCP)
    Stream,
    /// Connectionless (UDP)
    Datagram,
}

impl SocketKind {
    pub(crate) fn socket_type(self) -> socket2::Type {
        match self {
            SocketKind::Stream => socket2::Type::STREAM,
            SocketKind::Datagram => socket2::Type::DGRAM,
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketKind::Stream => write!(f, "TCP"),
            SocketKind::Datagram => write!(f, "UDP"),
        }
    }
}

/// Ordered, never-empty list of candidate addresses for one port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressList {
    kind: SocketKind,
    port: u16,
    candidates: Vec<SocketAddr>,
}

impl AddressList {
    /// Resolves the loopback host for `port`; `None` asks for an ephemeral port
    ///
    /// Only IPv4 candidates are kept.
    pub async fn resolve(kind: SocketKind, port: Option<u16>) -> Result<Self, AddressError> {
        let port = port.unwrap_or(0);
        let resolved = lookup_host((LOOPBACK_HOST, port))
            .await
            .map_err(|e| AddressError::Resolve {
                port,
                reason: e.to_string(),
            })?;

        let candidates: Vec<SocketAddr> = resolved.filter(SocketAddr::is_ipv4).collect();
        if candidates.is_empty() {
            return Err(AddressError::Empty { port });
        }

        debug!(
            "Resolved {} {} port {} to {:?}",
            LOOPBACK_HOST, kind, port, candidates
        );
        Ok(Self {
            kind,
            port,
            candidates,
        })
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether this list can stand in for a fresh resolution of (`kind`, `port`)
    pub fn matches(&self, kind: SocketKind, port: u16) -> bool {
        self.kind == kind && self.port == port
    }

    /// Candidates in resolver order
    pub fn iter(&self) -> impl Iterator<Item = &SocketAddr> {
        self.candidates.iter()
    }
}
