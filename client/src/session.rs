//! Client side of one broker connection

use log::{debug, info};
use shared::protocol::{encode_auth, encode_request};
use shared::{
    AuthStatus, CredentialEncoder, RequestKind, RoomStatus, ShiftEncoder, SocketKind, Transport,
    TransportError,
};

/// What the broker said about a login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Member,
    Guest,
    InvalidPassword,
    InvalidUser,
    /// The broker closed the connection
    Closed,
    /// A reply that is not an authentication status
    Unrecognized(String),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Member | AuthOutcome::Guest)
    }
}

impl From<AuthStatus> for AuthOutcome {
    fn from(status: AuthStatus) -> Self {
        match status {
            AuthStatus::ValidMember => AuthOutcome::Member,
            AuthStatus::ValidGuest => AuthOutcome::Guest,
            AuthStatus::InvalidPassword => AuthOutcome::InvalidPassword,
            AuthStatus::InvalidUser => AuthOutcome::InvalidUser,
        }
    }
}

/// What the broker said about an availability or reservation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Status(RoomStatus),
    Closed,
    Unrecognized(String),
}

/// A connected client
///
/// Credentials are encoded with `E` before they leave the process.
#[derive(Debug)]
pub struct ClientSession<E = ShiftEncoder> {
    transport: Transport,
    encoder: E,
    username: String,
    open: bool,
}

impl ClientSession<ShiftEncoder> {
    /// Connects to the broker's client-facing port on the loopback host
    pub async fn connect(port: u16) -> Result<Self, TransportError> {
        Self::connect_with_encoder(port, ShiftEncoder::default()).await
    }
}

impl<E: CredentialEncoder> ClientSession<E> {
    pub async fn connect_with_encoder(port: u16, encoder: E) -> Result<Self, TransportError> {
        let mut transport = Transport::create(SocketKind::Stream, Some(port)).await?;
        transport.connect(port).await?;
        debug!("Connected to the main server on port {}", port);

        Ok(Self {
            transport,
            encoder,
            username: String::new(),
            open: true,
        })
    }

    /// False once the broker has closed the connection
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Local port of the connection, as shown in the client's log lines
    pub fn local_port(&self) -> Result<u16, TransportError> {
        self.transport.local_port()
    }

    /// Logs in; without a password the broker treats the user as a guest
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: Option<&str>,
    ) -> Result<AuthOutcome, TransportError> {
        if !self.open {
            return Ok(AuthOutcome::Closed);
        }

        let password = password.filter(|password| !password.is_empty());
        let encoded_username = self.encoder.encode(username);
        let encoded_password = password.map(|password| self.encoder.encode(password));

        self.transport
            .send(&encode_auth(&encoded_username, encoded_password.as_deref()))
            .await?;
        self.username = username.to_string();

        if password.is_some() {
            info!("{} sent an authentication request to the main server.", username);
        } else {
            info!(
                "{} sent a guest request to the main server using TCP over port {}.",
                username,
                self.local_port()?
            );
        }

        let reply = self.transport.recv().await?;
        if reply.is_empty() {
            self.mark_closed();
            return Ok(AuthOutcome::Closed);
        }

        Ok(match AuthStatus::from_token(&reply) {
            Some(status) => status.into(),
            None => AuthOutcome::Unrecognized(reply),
        })
    }

    pub async fn check_availability(&mut self, room: &str) -> Result<RequestOutcome, TransportError> {
        self.request(RequestKind::Availability, room).await
    }

    pub async fn reserve(&mut self, room: &str) -> Result<RequestOutcome, TransportError> {
        self.request(RequestKind::Reservation, room).await
    }

    async fn request(&mut self, kind: RequestKind, room: &str) -> Result<RequestOutcome, TransportError> {
        if !self.open {
            return Ok(RequestOutcome::Closed);
        }

        self.transport.send(&encode_request(kind, room)).await?;
        match kind {
            RequestKind::Availability => {
                info!("{} sent an availability request to the main server.", self.username)
            }
            RequestKind::Reservation => {
                info!("{} sent a reservation request to the main server.", self.username)
            }
        }

        let reply = self.transport.recv().await?;
        if reply.is_empty() {
            self.mark_closed();
            return Ok(RequestOutcome::Closed);
        }

        info!(
            "The client received the response from the main server using TCP over port {}.",
            self.local_port()?
        );
        Ok(match RoomStatus::from_token(&reply) {
            Some(status) => RequestOutcome::Status(status),
            None => RequestOutcome::Unrecognized(reply),
        })
    }

    fn mark_closed(&mut self) {
        info!("The main server has closed the connection.");
        self.open = false;
        self.transport.close();
    }
}
