//! # Shared Reservation Plumbing
//!
//! Everything the client, the broker and the backends agree on: how sockets
//! are owned, how addresses are resolved, and what travels over the wire.
//!
//! ## Module Organization
//!
//! - [`address`] resolves the loopback host into ordered candidate addresses
//! - [`transport`] owns one TCP or UDP socket per instance, closing it on drop
//! - [`protocol`] defines the single-character status and request tokens and
//!   the line-oriented request, reply and authentication bodies
//! - [`bulk`] packs a backend's partition into datagram-sized chunks and
//!   collects them on the broker side
//! - [`config`] holds the well-known ports, the transfer limit and the
//!   partition routing table
//! - [`encoding`] holds the credential encoders and the scheme selecting one
//! - [`error`] is the error taxonomy shared by all tiers
//!
//! ## Transfer Limits
//!
//! Every receive reads into a [`MAX_DATA_SIZE`] byte window (one byte is kept
//! back, as the protocol has always done), so bodies never exceed
//! `MAX_DATA_SIZE - 1` bytes. Bulk pushes keep an extra safety margin so the
//! terminator record always fits.

pub mod address;
pub mod bulk;
pub mod config;
pub mod encoding;
pub mod error;
pub mod protocol;
pub mod transport;

pub use address::{AddressList, SocketKind};
pub use config::{
    BackendDirectory, BrokerPorts, PartitionKey, BROKER_BACKEND_PORT, BROKER_CLIENT_PORT,
    MAX_DATA_SIZE,
};
pub use encoding::{CredentialEncoder, CredentialScheme, Md5Encoder, ShiftEncoder};
pub use error::{AddressError, DataSourceError, TransportError};
pub use protocol::{AuthStatus, RequestKind, RoomStatus};
pub use transport::{PeerMessage, Transport, TransportState};
