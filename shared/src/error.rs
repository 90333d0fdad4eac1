//! Error taxonomy shared by every tier
//!
//! - [`AddressError`] is fatal to the operation that attempted the resolution
//! - [`TransportError`] is fatal to the connection or process owning the handle
//! - [`DataSourceError`] is fatal at startup
//!
//! Protocol anomalies (unknown rooms, malformed requests, spoofed senders)
//! never show up here; they travel to the peer as ordinary status codes.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn (host, port, socket kind) into candidate addresses
#[derive(Debug, Error)]
pub enum AddressError {
    /// The resolver itself reported an error
    #[error("address resolution for port {port} failed: {reason}")]
    Resolve { port: u16, reason: String },

    /// The resolver succeeded but produced nothing usable
    #[error("address resolution for port {port} produced no candidates")]
    Empty { port: u16 },
}

/// Handle-level failure, tagged with the socket operation that produced it
#[derive(Debug, Error)]
#[error("transport error: {operation}: {reason}")]
pub struct TransportError {
    operation: &'static str,
    reason: String,
}

impl TransportError {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }

    /// Wraps an OS error, keeping its diagnostic text
    pub fn os(operation: &'static str, err: io::Error) -> Self {
        Self::new(operation, err.to_string())
    }

    pub fn no_valid_address(operation: &'static str) -> Self {
        Self::new(operation, "no valid address")
    }

    pub fn address(operation: &'static str, err: AddressError) -> Self {
        Self::new(operation, err.to_string())
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// An external inventory or credential file could not be used
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("file {} could not be read: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
