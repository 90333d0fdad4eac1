//! # Reservation Client
//!
//! Talks to the main server over a single TCP connection: one login, then
//! any number of availability and reservation requests until either side
//! closes.
//!
//! ## Module Organization
//!
//! - [`session`] drives the connection and turns raw replies into outcomes
//! - [`messages`] maps outcomes to the sentences shown to the user
//! - [`input`] prompts for credentials, rooms and request types

pub mod input;
pub mod messages;
pub mod session;

pub use input::{Choice, Credentials, Prompter};
pub use session::{AuthOutcome, ClientSession, RequestOutcome};
