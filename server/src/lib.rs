//! # Reservation Servers
//!
//! The broker that clients connect to and the backend services that own the
//! room inventory.
//!
//! ## Startup
//!
//! Each backend loads its partition from disk and pushes all of it to the
//! broker over UDP. The broker waits until every backend in its
//! [`BackendDirectory`](shared::BackendDirectory) has finished, caches the
//! counts, and only then starts accepting TCP clients.
//!
//! ## Serving
//!
//! Every client connection gets its own task and its own copy of the room
//! cache. Requests are routed to a backend by the first character of the
//! room id and forwarded over the broker's single backend-facing UDP socket.
//! Backends answer one datagram at a time and are the only place counts are
//! decremented.
//!
//! ## Module Organization
//!
//! - [`backend`] runs one partition: load, push, serve
//! - [`broker`] collects pushes and accepts clients
//! - [`session`] handles one client connection on the broker
//! - [`cache`] is the broker's copy of room counts
//! - [`inventory`] is a backend's authoritative partition
//! - [`credentials`] holds encoded member logins

pub mod backend;
pub mod broker;
pub mod cache;
pub mod credentials;
pub mod inventory;
pub mod session;

pub use backend::{BackendConfig, BackendService, BackendState};
pub use broker::Broker;
pub use cache::{CachedRoom, RoomCache};
pub use credentials::CredentialStore;
pub use inventory::{Inventory, Reservation};
pub use session::{Session, SessionContext, SessionState};
