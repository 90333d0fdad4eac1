//! Broker: the single entry point clients talk to
//!
//! Startup happens in two phases. The broker first binds both of its ports
//! and collects every backend's bulk push into the room cache; only then
//! does it accept client connections. Each accepted connection is served by
//! its own task holding its own copy of the cache.

use crate::cache::RoomCache;
use crate::credentials::CredentialStore;
use crate::session::{Session, SessionContext};
use log::{error, info, warn};
use shared::bulk::{Ingest, InventoryCollector};
use shared::{
    BackendDirectory, BrokerPorts, SocketKind, Transport, TransportError, TransportState,
};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug)]
pub struct Broker {
    directory: Arc<BackendDirectory>,
    backend_link: Arc<Transport>,
    listener: Transport,
    cache: RoomCache,
}

impl Broker {
    /// Binds the backend-facing datagram port and the client-facing stream
    /// port; a port of 0 picks an ephemeral one
    pub async fn bind(ports: BrokerPorts, directory: BackendDirectory) -> Result<Self, TransportError> {
        let mut backend_link = Transport::create(SocketKind::Datagram, Some(ports.backend)).await?;
        backend_link.bind(ports.backend).await?;

        let mut listener = Transport::create(SocketKind::Stream, Some(ports.client)).await?;
        listener.bind(ports.client).await?;

        let broker = Self {
            directory: Arc::new(directory),
            backend_link: Arc::new(backend_link),
            listener,
            cache: RoomCache::default(),
        };

        info!(
            "The main server is up and running using UDP on port {} and TCP on port {}.",
            broker.backend_port()?,
            broker.client_port()?
        );
        Ok(broker)
    }

    pub fn backend_port(&self) -> Result<u16, TransportError> {
        self.backend_link.local_port()
    }

    pub fn client_port(&self) -> Result<u16, TransportError> {
        self.listener.local_port()
    }

    pub fn directory(&self) -> &BackendDirectory {
        &self.directory
    }

    /// Replaces the routing table; backends bound after the broker are only
    /// known once they have their ports
    pub fn set_directory(&mut self, directory: BackendDirectory) {
        self.directory = Arc::new(directory);
    }

    /// Cache every new session starts from
    pub fn cache(&self) -> &RoomCache {
        &self.cache
    }

    /// Starts queueing client connections; harmless when already listening
    pub fn listen(&mut self) -> Result<(), TransportError> {
        if self.listener.state() == TransportState::Listening {
            return Ok(());
        }
        self.listener.listen()?;
        info!("The main server is listening for client connections.");
        Ok(())
    }

    /// Receives bulk pushes until every configured backend has finished
    ///
    /// Datagrams from unknown ports are dropped. There is no timeout: a
    /// backend that never sends its terminator keeps the broker here.
    pub async fn collect_inventory(&mut self) -> Result<&RoomCache, TransportError> {
        let mut collector = InventoryCollector::new(&self.directory);

        while !collector.is_complete() {
            let pushed = self.backend_link.recv_from().await?;
            match collector.ingest(pushed.port, &pushed.message) {
                Ingest::Finished { partition, records } => info!(
                    "The main server has received the room status from Server {} using UDP over port {} ({} rooms in the last datagram).",
                    partition,
                    self.backend_port()?,
                    records
                ),
                Ingest::Partial { .. } | Ingest::Ignored => {}
            }
        }

        self.cache = RoomCache::from_pushed(collector.into_rooms());
        info!("The main server has cached {} rooms.", self.cache.len());
        Ok(&self.cache)
    }

    /// Accepts clients until `shutdown` completes
    ///
    /// A failed accept is logged and the loop goes on. Sessions still running
    /// at shutdown are detached rather than aborted.
    pub async fn run_until<F>(mut self, credentials: CredentialStore, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()>,
    {
        self.listen()?;

        let context = SessionContext {
            directory: Arc::clone(&self.directory),
            credentials: Arc::new(credentials),
            backend_link: Arc::clone(&self.backend_link),
        };
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("The main server is shutting down.");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(connection) => {
                        let session = Session::new(connection, context.clone(), self.cache.clone());
                        sessions.spawn(session.run());
                    }
                    Err(e) => warn!("The main server failed to accept a connection: {}", e),
                },
                Some(finished) = sessions.join_next() => match finished {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("A client session ended with an error: {}", e),
                    Err(e) => error!("A client session panicked: {}", e),
                },
            }
        }

        sessions.detach_all();
        Ok(())
    }
}
