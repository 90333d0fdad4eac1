//! Socket ownership for both TCP and UDP behind a single type
//!
//! A [`Transport`] owns exactly one OS socket. It walks through
//! unbound → bound → listening/connected → closed, and the handle is released
//! when the transport is closed or dropped, whichever comes first. Transports
//! are move-only; there is no way to duplicate a live handle.
//!
//! Sockets are created and bound through `socket2` (so address reuse can be
//! set before bind) and handed to tokio once they reach a state that does
//! I/O.

use crate::address::{AddressList, SocketKind};
use crate::config::{LISTEN_BACKLOG, MAX_DATA_SIZE};
use crate::error::TransportError;
use log::debug;
use parking_lot::Mutex;
use socket2::{Domain, Socket};
use std::fmt;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream, UdpSocket};

/// Observable lifecycle stage of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Unbound,
    Bound,
    Listening,
    Connected,
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Unbound => "unbound",
            TransportState::Bound => "bound",
            TransportState::Listening => "listening",
            TransportState::Connected => "connected",
            TransportState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// A datagram together with the port it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMessage {
    pub message: String,
    pub port: u16,
}

#[derive(Debug)]
enum Handle {
    Unbound(Socket),
    /// Bound stream socket that is not listening yet
    Bound(Socket),
    Listening(TcpListener),
    Connected(TcpStream),
    /// Bound datagram socket
    Datagram(UdpSocket),
    Closed,
}

impl Handle {
    fn state(&self) -> TransportState {
        match self {
            Handle::Unbound(_) => TransportState::Unbound,
            Handle::Bound(_) | Handle::Datagram(_) => TransportState::Bound,
            Handle::Listening(_) => TransportState::Listening,
            Handle::Connected(_) => TransportState::Connected,
            Handle::Closed => TransportState::Closed,
        }
    }
}

/// Owner of one OS socket handle
#[derive(Debug)]
pub struct Transport {
    kind: SocketKind,
    handle: Handle,
    /// Last resolved address, reused while the port matches and replaced by
    /// whichever operation resolves a different one
    saved: Mutex<Option<AddressList>>,
    /// Peer port of a connected or accepted stream
    peer_port: Option<u16>,
}

impl Transport {
    /// Creates a socket for the first candidate address of (`kind`, `port`)
    ///
    /// With a port, the resolved address is kept for later bind/connect calls
    /// on the same port. Without one, an ephemeral address is resolved only to
    /// pick the socket family.
    pub async fn create(kind: SocketKind, port: Option<u16>) -> Result<Self, TransportError> {
        let addresses = AddressList::resolve(kind, port)
            .await
            .map_err(|e| TransportError::address("create", e))?;

        let socket = addresses
            .iter()
            .find_map(
                |addr| match Socket::new(Domain::for_address(*addr), kind.socket_type(), None) {
                    Ok(socket) => Some(socket),
                    Err(e) => {
                        debug!("Invalid socket address {}: {}", addr, e);
                        None
                    }
                },
            )
            .ok_or_else(|| TransportError::no_valid_address("create"))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::os("create", e))?;

        debug!("Created {} socket", kind);
        Ok(Self {
            kind,
            handle: Handle::Unbound(socket),
            saved: Mutex::new(port.map(|_| addresses)),
            peer_port: None,
        })
    }

    /// Wraps an already-connected stream, as produced by accept
    pub fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            kind: SocketKind::Stream,
            handle: Handle::Connected(stream),
            saved: Mutex::new(None),
            peer_port: Some(peer.port()),
        }
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    pub fn state(&self) -> TransportState {
        self.handle.state()
    }

    /// Port of the remote end for connected or accepted streams
    pub fn peer_port(&self) -> Option<u16> {
        self.peer_port
    }

    /// Binds to `port` on the loopback host (0 for an ephemeral port)
    ///
    /// Address reuse is enabled first. Datagram transports are ready for
    /// [`send_to`](Self::send_to) and [`recv_from`](Self::recv_from) once bound;
    /// stream transports still have to [`listen`](Self::listen).
    pub async fn bind(&mut self, port: u16) -> Result<(), TransportError> {
        let socket = match &self.handle {
            Handle::Unbound(socket) => socket,
            other => return Err(self.invalid_state("bind", other.state())),
        };

        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::os("set_reuse_address", e))?;

        let addresses = self.addresses_for("bind", port).await?;
        let bound = addresses.iter().any(|addr| match socket.bind(&(*addr).into()) {
            Ok(()) => true,
            Err(e) => {
                debug!("Invalid socket bind address {}: {}", addr, e);
                false
            }
        });
        if !bound {
            return Err(TransportError::no_valid_address("bind"));
        }

        let socket = match self.take_handle() {
            Handle::Unbound(socket) => socket,
            other => {
                self.handle = other;
                return Err(self.invalid_state("bind", self.state()));
            }
        };

        self.handle = match self.kind {
            SocketKind::Stream => Handle::Bound(socket),
            SocketKind::Datagram => {
                let udp = UdpSocket::from_std(socket.into())
                    .map_err(|e| TransportError::os("bind", e))?;
                Handle::Datagram(udp)
            }
        };

        debug!("Bound {} socket to port {}", self.kind, port);
        Ok(())
    }

    /// Marks a bound stream transport as ready to accept connections
    pub fn listen(&mut self) -> Result<(), TransportError> {
        match self.take_handle() {
            Handle::Bound(socket) => {
                if let Err(e) = socket.listen(LISTEN_BACKLOG) {
                    self.handle = Handle::Bound(socket);
                    return Err(TransportError::os("listen", e));
                }
                let listener = TcpListener::from_std(socket.into())
                    .map_err(|e| TransportError::os("listen", e))?;
                self.handle = Handle::Listening(listener);
                debug!("Listening with backlog {}", LISTEN_BACKLOG);
                Ok(())
            }
            other => {
                let state = other.state();
                self.handle = other;
                Err(self.invalid_state("listen", state))
            }
        }
    }

    /// Connects a stream transport to `port` on the loopback host
    ///
    /// Candidates are tried in order. The first attempt uses this transport's
    /// own socket; a failed connect leaves a socket unusable, so later
    /// candidates get a fresh one.
    pub async fn connect(&mut self, port: u16) -> Result<(), TransportError> {
        if self.kind != SocketKind::Stream {
            return Err(TransportError::new("connect", "datagram transports do not connect"));
        }

        let addresses = self.addresses_for("connect", port).await?;

        let mut own_socket = match self.take_handle() {
            Handle::Unbound(socket) | Handle::Bound(socket) => Some(socket),
            other => {
                let state = other.state();
                self.handle = other;
                return Err(self.invalid_state("connect", state));
            }
        };

        for addr in addresses.iter() {
            let attempt = match own_socket.take() {
                Some(socket) => Ok(TcpSocket::from_std_stream(socket.into())),
                None if addr.is_ipv4() => TcpSocket::new_v4(),
                None => TcpSocket::new_v6(),
            };
            let tcp = match attempt {
                Ok(tcp) => tcp,
                Err(e) => {
                    debug!("Could not create socket for {}: {}", addr, e);
                    continue;
                }
            };

            match tcp.connect(*addr).await {
                Ok(stream) => {
                    self.handle = Handle::Connected(stream);
                    self.peer_port = Some(port);
                    debug!("Connected to port {}", port);
                    return Ok(());
                }
                Err(e) => debug!("Invalid socket connect address {}: {}", addr, e),
            }
        }

        Err(TransportError::no_valid_address("connect"))
    }

    /// Waits for the next incoming connection
    ///
    /// The listening transport stays as it is; the connection gets its own
    /// transport with the peer's port recorded.
    pub async fn accept(&self) -> Result<Transport, TransportError> {
        let listener = match &self.handle {
            Handle::Listening(listener) => listener,
            other => return Err(self.invalid_state("accept", other.state())),
        };

        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| TransportError::os("accept", e))?;

        debug!("Established connection with port {}", peer.port());
        Ok(Transport::from_stream(stream, peer))
    }

    /// Writes a whole message to the connected peer
    pub async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        check_size("send", message)?;
        let stream = match &mut self.handle {
            Handle::Connected(stream) => stream,
            other => {
                let state = other.state();
                return Err(self.invalid_state("send", state));
            }
        };

        stream
            .write_all(message.as_bytes())
            .await
            .map_err(|e| TransportError::os("send", e))?;

        debug!("Sent {} bytes of message: {:?}", message.len(), message);
        Ok(())
    }

    /// Reads at most one transfer from the connected peer
    ///
    /// An empty string means the peer closed the connection.
    pub async fn recv(&mut self) -> Result<String, TransportError> {
        let stream = match &mut self.handle {
            Handle::Connected(stream) => stream,
            other => {
                let state = other.state();
                return Err(self.invalid_state("recv", state));
            }
        };

        let mut buffer = [0u8; MAX_DATA_SIZE];
        let received = stream
            .read(&mut buffer[..MAX_DATA_SIZE - 1])
            .await
            .map_err(|e| TransportError::os("recv", e))?;

        let message = String::from_utf8_lossy(&buffer[..received]).into_owned();
        if received > 0 {
            debug!("Received {} bytes of message: {:?}", received, message);
        }
        Ok(message)
    }

    /// Sends one datagram to `port` on the loopback host
    ///
    /// The resolved destination is cached and only re-resolved when the
    /// destination port differs from the previous call.
    pub async fn send_to(&self, port: u16, message: &str) -> Result<(), TransportError> {
        check_size("send_to", message)?;
        let socket = match &self.handle {
            Handle::Datagram(socket) => socket,
            other => return Err(self.invalid_state("send_to", other.state())),
        };

        let addresses = self.addresses_for("send_to", port).await?;

        for addr in addresses.iter() {
            match socket.send_to(message.as_bytes(), addr).await {
                Ok(sent) => {
                    debug!("Sent {} bytes to port {}: {:?}", sent, port, message);
                    return Ok(());
                }
                Err(e) => debug!("Invalid send to address {}: {}", addr, e),
            }
        }

        Err(TransportError::no_valid_address("send_to"))
    }

    /// Receives one datagram along with the sender's port
    pub async fn recv_from(&self) -> Result<PeerMessage, TransportError> {
        let socket = match &self.handle {
            Handle::Datagram(socket) => socket,
            other => return Err(self.invalid_state("recv_from", other.state())),
        };

        let mut buffer = [0u8; MAX_DATA_SIZE];
        let (received, sender) = socket
            .recv_from(&mut buffer[..MAX_DATA_SIZE - 1])
            .await
            .map_err(|e| TransportError::os("recv_from", e))?;

        let message = String::from_utf8_lossy(&buffer[..received]).into_owned();
        debug!(
            "Received {} bytes from port {}: {:?}",
            received,
            sender.port(),
            message
        );
        Ok(PeerMessage {
            message,
            port: sender.port(),
        })
    }

    /// Port the OS assigned to this socket
    pub fn local_port(&self) -> Result<u16, TransportError> {
        let addr = match &self.handle {
            Handle::Unbound(socket) | Handle::Bound(socket) => socket
                .local_addr()
                .map_err(|e| TransportError::os("local_port", e))?
                .as_socket()
                .ok_or_else(|| TransportError::new("local_port", "not an internet socket"))?,
            Handle::Listening(listener) => listener
                .local_addr()
                .map_err(|e| TransportError::os("local_port", e))?,
            Handle::Connected(stream) => stream
                .local_addr()
                .map_err(|e| TransportError::os("local_port", e))?,
            Handle::Datagram(socket) => socket
                .local_addr()
                .map_err(|e| TransportError::os("local_port", e))?,
            Handle::Closed => return Err(self.invalid_state("local_port", TransportState::Closed)),
        };
        Ok(addr.port())
    }

    /// Releases the socket; calling it again does nothing
    pub fn close(&mut self) {
        if !matches!(self.handle, Handle::Closed) {
            debug!("Closing {} socket", self.kind);
            self.handle = Handle::Closed;
        }
    }

    fn take_handle(&mut self) -> Handle {
        std::mem::replace(&mut self.handle, Handle::Closed)
    }

    async fn addresses_for(
        &self,
        operation: &'static str,
        port: u16,
    ) -> Result<AddressList, TransportError> {
        let cached = self
            .saved
            .lock()
            .as_ref()
            .filter(|saved| saved.matches(self.kind, port))
            .cloned();
        if let Some(addresses) = cached {
            return Ok(addresses);
        }

        let fresh = AddressList::resolve(self.kind, Some(port))
            .await
            .map_err(|e| TransportError::address(operation, e))?;
        *self.saved.lock() = Some(fresh.clone());
        Ok(fresh)
    }

    fn invalid_state(&self, operation: &'static str, state: TransportState) -> TransportError {
        TransportError::new(
            operation,
            format!("not permitted on a {} {} socket", state, self.kind),
        )
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_size(operation: &'static str, message: &str) -> Result<(), TransportError> {
    if message.len() > MAX_DATA_SIZE - 1 {
        return Err(TransportError::new(
            operation,
            format!(
                "message of {} bytes exceeds the {} byte transfer limit",
                message.len(),
                MAX_DATA_SIZE - 1
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    async fn bound_datagram() -> Transport {
        let mut transport = assert_ok!(Transport::create(SocketKind::Datagram, None).await);
        assert_ok!(transport.bind(0).await);
        transport
    }

    async fn listening_stream() -> (Transport, u16) {
        let mut listener = assert_ok!(Transport::create(SocketKind::Stream, None).await);
        assert_ok!(listener.bind(0).await);
        assert_ok!(listener.listen());
        let port = assert_ok!(listener.local_port());
        (listener, port)
    }

    #[tokio::test]
    async fn test_create_starts_unbound() {
        let transport = assert_ok!(Transport::create(SocketKind::Stream, Some(0)).await);

        assert_eq!(transport.state(), TransportState::Unbound);
        assert_eq!(transport.kind(), SocketKind::Stream);
        assert_eq!(transport.peer_port(), None);
    }

    #[tokio::test]
    async fn test_datagram_exchange_reports_sender_port() {
        let a = bound_datagram().await;
        let b = bound_datagram().await;
        let a_port = assert_ok!(a.local_port());
        let b_port = assert_ok!(b.local_port());
        assert_ne!(a_port, 0);

        assert_ok!(a.send_to(b_port, "A\nS101").await);
        let received = assert_ok!(b.recv_from().await);

        assert_eq!(received.message, "A\nS101");
        assert_eq!(received.port, a_port);
    }

    #[tokio::test]
    async fn test_send_to_switches_destination_port() {
        let sender = bound_datagram().await;
        let first = bound_datagram().await;
        let second = bound_datagram().await;

        assert_ok!(sender.send_to(assert_ok!(first.local_port()), "one").await);
        assert_ok!(sender.send_to(assert_ok!(second.local_port()), "two").await);
        assert_ok!(sender.send_to(assert_ok!(first.local_port()), "three").await);

        assert_eq!(assert_ok!(first.recv_from().await).message, "one");
        assert_eq!(assert_ok!(second.recv_from().await).message, "two");
        assert_eq!(assert_ok!(first.recv_from().await).message, "three");
    }

    #[tokio::test]
    async fn test_stream_connect_accept_and_exchange() {
        let (listener, port) = listening_stream().await;

        let mut client = assert_ok!(Transport::create(SocketKind::Stream, None).await);
        let (connected, accepted) = tokio::join!(client.connect(port), listener.accept());
        assert_ok!(connected);
        let mut server_side = assert_ok!(accepted);

        assert_eq!(client.state(), TransportState::Connected);
        assert_eq!(client.peer_port(), Some(port));
        assert_eq!(server_side.peer_port(), Some(assert_ok!(client.local_port())));
        assert_eq!(listener.state(), TransportState::Listening);

        assert_ok!(client.send("guest\n").await);
        assert_eq!(assert_ok!(server_side.recv().await), "guest\n");

        assert_ok!(server_side.send("1").await);
        assert_eq!(assert_ok!(client.recv().await), "1");
    }

    #[tokio::test]
    async fn test_peer_close_reads_as_empty_message() {
        let (listener, port) = listening_stream().await;

        let mut client = assert_ok!(Transport::create(SocketKind::Stream, None).await);
        let (connected, accepted) = tokio::join!(client.connect(port), listener.accept());
        assert_ok!(connected);
        let mut server_side = assert_ok!(accepted);

        client.close();
        assert_eq!(assert_ok!(server_side.recv().await), "");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut transport = bound_datagram().await;

        transport.close();
        transport.close();

        assert_eq!(transport.state(), TransportState::Closed);
        assert_err!(transport.local_port());
    }

    #[tokio::test]
    async fn test_operations_rejected_in_wrong_state() {
        let unbound = assert_ok!(Transport::create(SocketKind::Datagram, None).await);
        let err = assert_err!(unbound.send_to(44626, "x").await);
        assert_eq!(err.operation(), "send_to");

        let mut stream = assert_ok!(Transport::create(SocketKind::Stream, None).await);
        assert_err!(stream.listen());
        assert_err!(stream.send("x").await);
        assert_err!(stream.accept().await);

        let mut datagram = bound_datagram().await;
        let err = assert_err!(datagram.connect(45626).await);
        assert_eq!(err.operation(), "connect");
        assert_err!(datagram.bind(0).await);
    }

    #[tokio::test]
    async fn test_connect_without_listener_fails() {
        // Bind a port without listening so nothing accepts on it
        let mut placeholder = assert_ok!(Transport::create(SocketKind::Stream, None).await);
        assert_ok!(placeholder.bind(0).await);
        let port = assert_ok!(placeholder.local_port());

        let mut client = assert_ok!(Transport::create(SocketKind::Stream, None).await);
        let err = assert_err!(client.connect(port).await);
        assert_eq!(err.reason(), "no valid address");
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let a = bound_datagram().await;
        let body = "x".repeat(MAX_DATA_SIZE);

        let err = assert_err!(a.send_to(44626, &body).await);
        assert!(err.reason().contains("transfer limit"));
    }

    #[tokio::test]
    async fn test_bind_conflict_reports_error() {
        let (listener, port) = listening_stream().await;

        let mut second = assert_ok!(Transport::create(SocketKind::Stream, Some(port)).await);
        let err = assert_err!(second.bind(port).await);
        assert_eq!(err.operation(), "bind");
        drop(listener);
    }

    fn saved_port(transport: &Transport) -> Option<u16> {
        transport.saved.lock().as_ref().map(|saved| saved.port())
    }

    #[tokio::test]
    async fn test_bind_and_connect_keep_resolved_address() {
        let mut listener = assert_ok!(Transport::create(SocketKind::Stream, None).await);
        assert_eq!(saved_port(&listener), None);
        assert_ok!(listener.bind(0).await);
        assert_eq!(saved_port(&listener), Some(0));
        assert_ok!(listener.listen());
        let port = assert_ok!(listener.local_port());

        let mut client = assert_ok!(Transport::create(SocketKind::Stream, None).await);
        assert_ok!(client.connect(port).await);
        assert_eq!(saved_port(&client), Some(port));

        let a = bound_datagram().await;
        let b = bound_datagram().await;
        let b_port = assert_ok!(b.local_port());
        assert_ok!(a.send_to(b_port, "A\nS101").await);
        assert_eq!(saved_port(&a), Some(b_port));
    }
}
