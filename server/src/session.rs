//! Per-connection handling on the broker
//!
//! A session authenticates its client, then serves requests until the client
//! closes the connection. Backend traffic goes through the broker's shared
//! backend-facing datagram transport. There is no session id on that
//! exchange: a reply is trusted only if it comes from the port the request
//! went to, and concurrent sessions talking to the same backend may receive
//! each other's replies. No exchange has a timeout; a silent backend blocks
//! the session that is waiting on it.

use crate::cache::RoomCache;
use crate::credentials::CredentialStore;
use log::{info, warn};
use shared::protocol::{parse_auth, parse_reply, parse_request, AuthRequest, RequestKind};
use shared::{AuthStatus, BackendDirectory, RoomStatus, Transport, TransportError};
use std::sync::Arc;

/// Broker resources every session reads
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub directory: Arc<BackendDirectory>,
    pub credentials: Arc<CredentialStore>,
    /// Shared backend-facing datagram transport
    pub backend_link: Arc<Transport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingCredentials,
    Authenticated { member: bool },
    Closed,
}

#[derive(Debug)]
pub struct Session {
    connection: Transport,
    context: SessionContext,
    cache: RoomCache,
    username: String,
    state: SessionState,
}

impl Session {
    /// Starts a session on an accepted connection with its own copy of the
    /// room cache
    pub fn new(connection: Transport, context: SessionContext, cache: RoomCache) -> Self {
        Self {
            connection,
            context,
            cache,
            username: String::new(),
            state: SessionState::AwaitingCredentials,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn cache(&self) -> &RoomCache {
        &self.cache
    }

    /// Authenticates, then serves requests until the client disconnects
    ///
    /// Returns this session's view of the room cache at the time it ended.
    pub async fn run(mut self) -> Result<RoomCache, TransportError> {
        while self.state == SessionState::AwaitingCredentials {
            self.authenticate().await?;
        }

        while self.state != SessionState::Closed {
            self.serve_request().await?;
        }

        Ok(self.cache)
    }

    /// Handles one authentication attempt
    pub async fn authenticate(&mut self) -> Result<(), TransportError> {
        let body = self.connection.recv().await?;

        let Some(request) = parse_auth(&body) else {
            self.mark_closed();
            return Ok(());
        };
        self.username = request.username().to_string();

        match request {
            AuthRequest::Member { username, secret } => {
                info!(
                    "The main server received the authentication for {} from port {:?}.",
                    username,
                    self.connection.peer_port()
                );
                let status = self.context.credentials.verify(username, secret);
                if status == AuthStatus::ValidMember {
                    self.state = SessionState::Authenticated { member: true };
                }
                self.connection.send(status.token()).await?;
                info!("The main server sent the authentication result to the client.");
            }
            AuthRequest::Guest { username } => {
                info!("The main server accepts {} as a guest.", username);
                self.state = SessionState::Authenticated { member: false };
                self.connection.send(AuthStatus::ValidGuest.token()).await?;
                info!("The main server sent the guest response to the client.");
            }
        }

        Ok(())
    }

    /// Handles one availability or reservation request
    pub async fn serve_request(&mut self) -> Result<(), TransportError> {
        let body = self.connection.recv().await?;
        if body.is_empty() {
            self.mark_closed();
            return Ok(());
        }

        let request = match parse_request(&body) {
            Ok(request) => request,
            Err(status) => {
                warn!("The main server received a malformed request from {}.", self.username);
                return self.connection.send(status.token()).await;
            }
        };

        let reply = match request.request_kind() {
            Some(RequestKind::Availability) => {
                info!(
                    "The main server has received the availability request on Room {} from {}.",
                    request.room, self.username
                );
                self.availability(&body, request.room).await?
            }
            Some(RequestKind::Reservation) => {
                info!(
                    "The main server has received the reservation request on Room {} from {}.",
                    request.room, self.username
                );
                self.reservation(&body, request.room).await?
            }
            None => {
                warn!("The main server received an invalid request type.");
                RoomStatus::InvalidRequest.token().to_string()
            }
        };

        self.connection.send(&reply).await
    }

    async fn availability(&self, body: &str, room: &str) -> Result<String, TransportError> {
        let reply = match self.exchange(body, room).await? {
            Some(reply) if !reply.is_empty() => reply,
            Some(_) => {
                warn!("The backend server has sent an empty response for Room {}.", room);
                RoomStatus::NotFound.token().to_string()
            }
            None => RoomStatus::NotFound.token().to_string(),
        };
        info!("The main server sent the availability information to the client.");
        Ok(reply)
    }

    async fn reservation(&mut self, body: &str, room: &str) -> Result<String, TransportError> {
        if self.state != (SessionState::Authenticated { member: true }) {
            info!("{} cannot make a reservation.", self.username);
            return Ok(RoomStatus::UserNotMember.token().to_string());
        }

        let Some(response) = self.exchange(body, room).await? else {
            return Ok(RoomStatus::NotFound.token().to_string());
        };

        let reply = parse_reply(&response);
        let status = if reply.status == RoomStatus::Available.token() {
            self.cache.record_reservation(room, reply.count_or_zero());
            info!("The room status of Room {} has been updated.", room);
            reply.status.to_string()
        } else if reply.status.is_empty() {
            warn!("The backend server has sent an empty response for Room {}.", room);
            RoomStatus::NotFound.token().to_string()
        } else {
            reply.status.to_string()
        };

        info!("The main server sent the reservation result to the client.");
        Ok(status)
    }

    /// Forwards `body` to the backend owning `room` and waits for its reply
    ///
    /// `None` means there was no trustworthy reply: the partition is unknown,
    /// or the datagram that arrived came from some other port and was dropped.
    async fn exchange(&self, body: &str, room: &str) -> Result<Option<String>, TransportError> {
        let Some((partition, port)) = self.context.directory.route(room) else {
            info!("The main server found no corresponding Server for room {}.", room);
            return Ok(None);
        };

        let link = &self.context.backend_link;
        link.send_to(port, body).await?;
        info!("The main server sent a request to Server {}.", partition);

        let response = link.recv_from().await?;
        if response.port != port {
            warn!(
                "The main server has received a response from an unexpected Server with port {}.",
                response.port
            );
            return Ok(None);
        }

        info!("The main server received the response from Server {}.", partition);
        Ok(Some(response.message))
    }

    fn mark_closed(&mut self) {
        info!(
            "The client with port {:?} has closed the connection.",
            self.connection.peer_port()
        );
        self.state = SessionState::Closed;
        self.connection.close();
    }
}
