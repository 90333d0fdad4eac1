//! Backend service owning one inventory partition
//!
//! A backend binds its well-known datagram port, loads its partition, pushes
//! the whole partition to the broker and then answers availability and
//! reservation requests one datagram at a time. Requests are only accepted
//! from the broker's backend-facing port.

use crate::inventory::{Inventory, Reservation};
use log::{info, warn};
use shared::bulk::chunk_inventory;
use shared::protocol::{encode_reservation_success, parse_request, RequestKind, RoomStatus};
use shared::{PartitionKey, SocketKind, Transport, TransportError};
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    /// Partition served, also the backend's name in logs
    pub name: PartitionKey,
    /// Datagram port to bind, 0 for an ephemeral port
    pub port: u16,
    /// Broker's backend-facing port; the only accepted request source
    pub broker_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Loading,
    Broadcasting,
    Serving,
}

#[derive(Debug)]
pub struct BackendService {
    config: BackendConfig,
    transport: Transport,
    inventory: Inventory,
    state: BackendState,
}

impl BackendService {
    /// Creates and binds the backend's datagram transport
    pub async fn bind(config: BackendConfig) -> Result<Self, TransportError> {
        let mut transport = Transport::create(SocketKind::Datagram, Some(config.port)).await?;
        transport.bind(config.port).await?;

        info!(
            "The Server {} is up and running using UDP on port {}.",
            config.name,
            transport.local_port()?
        );

        Ok(Self {
            config,
            transport,
            inventory: Inventory::default(),
            state: BackendState::Loading,
        })
    }

    pub fn local_port(&self) -> Result<u16, TransportError> {
        self.transport.local_port()
    }

    pub fn state(&self) -> BackendState {
        self.state
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Installs the partition read from the external store
    pub fn load(&mut self, inventory: Inventory) {
        info!(
            "The Server {} loaded {} rooms.",
            self.config.name,
            inventory.len()
        );
        self.inventory = inventory;
    }

    /// Pushes the whole partition to the broker, terminator last
    pub async fn broadcast(&mut self) -> Result<(), TransportError> {
        self.state = BackendState::Broadcasting;

        for chunk in chunk_inventory(self.inventory.records()) {
            self.transport
                .send_to(self.config.broker_port, &chunk)
                .await?;
        }

        info!(
            "The Server {} has sent the room status to the main server.",
            self.config.name
        );
        self.state = BackendState::Serving;
        Ok(())
    }

    /// Loads, broadcasts and serves until `shutdown` completes
    pub async fn run_until<F>(mut self, inventory: Inventory, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()>,
    {
        self.load(inventory);
        self.broadcast().await?;
        self.serve_until(shutdown).await
    }

    /// Answers requests until `shutdown` completes
    ///
    /// Per-request problems are answered with status codes; only a failing
    /// socket ends the loop with an error.
    pub async fn serve_until<F>(&mut self, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("The Server {} is shutting down.", self.config.name);
                    return Ok(());
                }
                received = self.transport.recv_from() => {
                    let request = received?;

                    if request.port != self.config.broker_port {
                        warn!(
                            "The Server {} has received a request from an unknown server on UDP with port {}.",
                            self.config.name, request.port
                        );
                        continue;
                    }

                    let reply = self.handle_request(&request.message);
                    self.transport.send_to(self.config.broker_port, &reply).await?;
                }
            }
        }
    }

    /// Computes the reply body for one request body
    pub fn handle_request(&mut self, body: &str) -> String {
        let name = self.config.name;

        let request = match parse_request(body) {
            Ok(request) => request,
            Err(status) => {
                let missing = match status {
                    RoomStatus::RequestEmpty => "request type",
                    _ => "room",
                };
                warn!(
                    "The Server {} has received a request with a missing {}.",
                    name, missing
                );
                return status.token().to_string();
            }
        };

        match request.request_kind() {
            Some(RequestKind::Availability) => {
                info!("The Server {} received an availability request from the main server.", name);
                let status = self.inventory.availability(request.room);
                match status {
                    RoomStatus::NotFound => info!("Not able to find the room layout."),
                    RoomStatus::Available => info!("Room {} is available.", request.room),
                    _ => info!("Room {} is not available.", request.room),
                }
                status.token().to_string()
            }
            Some(RequestKind::Reservation) => {
                info!("The Server {} received a reservation request from the main server.", name);
                match self.inventory.reserve(request.room) {
                    Reservation::Reserved { remaining } => {
                        info!(
                            "Successful reservation. The count of Room {} is now {}.",
                            request.room, remaining
                        );
                        encode_reservation_success(remaining)
                    }
                    Reservation::Unavailable => {
                        info!(
                            "Cannot make a reservation. Room {} is not available.",
                            request.room
                        );
                        RoomStatus::NotAvailable.token().to_string()
                    }
                    Reservation::NotFound => {
                        info!("Cannot make a reservation. Not able to find the room layout.");
                        RoomStatus::NotFound.token().to_string()
                    }
                }
            }
            None => {
                warn!("The Server {} has received an invalid request type.", name);
                RoomStatus::InvalidRequest.token().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio_test::assert_ok;

    fn config(broker_port: u16) -> BackendConfig {
        BackendConfig {
            name: PartitionKey::new('S'),
            port: 0,
            broker_port,
        }
    }

    async fn bound_datagram() -> Transport {
        let mut transport = assert_ok!(Transport::create(SocketKind::Datagram, None).await);
        assert_ok!(transport.bind(0).await);
        transport
    }

    async fn backend_with(rooms: &[(&str, u32)]) -> BackendService {
        let mut backend = assert_ok!(BackendService::bind(config(44626)).await);
        backend.load(Inventory::from_records(rooms.iter().copied()));
        backend
    }

    #[tokio::test]
    async fn test_availability_replies() {
        let mut backend = backend_with(&[("S101", 2), ("S102", 0)]).await;

        assert_eq!(backend.handle_request("A\nS101"), "0");
        assert_eq!(backend.handle_request("A\nS102"), "1");
        assert_eq!(backend.handle_request("A\nZ999"), "2");
        assert_eq!(backend.inventory().count("S101"), Some(2));
    }

    #[tokio::test]
    async fn test_reservation_replies_with_remaining_count() {
        let mut backend = backend_with(&[("S101", 2)]).await;

        assert_eq!(backend.handle_request("R\nS101"), "0\n1");
        assert_eq!(backend.handle_request("R\nS101"), "0\n0");
        assert_eq!(backend.handle_request("R\nS101"), "1");
        assert_eq!(backend.handle_request("R\nS999"), "2");
        assert_eq!(backend.inventory().count("S101"), Some(0));
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let mut backend = backend_with(&[("S101", 2)]).await;

        assert_eq!(backend.handle_request(""), RoomStatus::RequestEmpty.token());
        assert_eq!(backend.handle_request("A"), RoomStatus::RoomEmpty.token());
        assert_eq!(backend.handle_request("X\nS101"), RoomStatus::InvalidRequest.token());
        assert_eq!(backend.inventory().count("S101"), Some(2));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_broker_port() {
        let broker = bound_datagram().await;
        let broker_port = assert_ok!(broker.local_port());

        let mut backend = assert_ok!(BackendService::bind(config(broker_port)).await);
        backend.load(Inventory::from_records([("S101", 2)]));
        assert_eq!(backend.state(), BackendState::Loading);

        assert_ok!(backend.broadcast().await);
        assert_eq!(backend.state(), BackendState::Serving);

        let pushed = assert_ok!(broker.recv_from().await);
        assert_eq!(pushed.message, "S101,2\n,0");
        assert_eq!(pushed.port, assert_ok!(backend.local_port()));
    }

    #[tokio::test]
    async fn test_serving_ignores_unknown_senders() {
        let broker = bound_datagram().await;
        let broker_port = assert_ok!(broker.local_port());
        let stranger = bound_datagram().await;

        let mut backend = assert_ok!(BackendService::bind(config(broker_port)).await);
        let backend_port = assert_ok!(backend.local_port());
        backend.load(Inventory::from_records([("S101", 2)]));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let serving = tokio::spawn(async move {
            let result = backend
                .serve_until(async {
                    let _ = stop_rx.await;
                })
                .await;
            (backend, result)
        });

        // The stranger's reservation must not touch the inventory
        assert_ok!(stranger.send_to(backend_port, "R\nS101").await);
        let nothing = tokio::time::timeout(Duration::from_millis(200), stranger.recv_from()).await;
        assert!(nothing.is_err());

        assert_ok!(broker.send_to(backend_port, "A\nS101").await);
        let reply = assert_ok!(broker.recv_from().await);
        assert_eq!(reply.message, "0");

        let _ = stop_tx.send(());
        let (backend, result) = assert_ok!(serving.await);
        assert_ok!(result);
        assert_eq!(backend.inventory().count("S101"), Some(2));
    }
}
