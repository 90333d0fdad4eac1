//! Whole-system fixture: a broker and real backends on ephemeral loopback
//! ports, all running as tasks of the test's runtime.

#![allow(dead_code)]

use client::ClientSession;
use server::{BackendConfig, BackendService, Broker, CredentialStore, Inventory, RoomCache};
use shared::protocol::encode_auth;
use shared::{
    BackendDirectory, BrokerPorts, CredentialEncoder, PartitionKey, ShiftEncoder, SocketKind,
    Transport,
};
use std::future::pending;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

pub const MEMBER: (&str, &str) = ("alice", "secret");

pub struct TestSystem {
    pub client_port: u16,
    pub broker_backend_port: u16,
    pub directory: BackendDirectory,
    /// Broker cache right after collection
    pub startup_cache: RoomCache,
    tasks: Vec<JoinHandle<()>>,
}

impl TestSystem {
    pub async fn client(&self) -> ClientSession {
        assert_ok!(ClientSession::connect(self.client_port).await)
    }

    pub async fn member(&self) -> ClientSession {
        let mut session = self.client().await;
        let outcome = assert_ok!(session.authenticate(MEMBER.0, Some(MEMBER.1)).await);
        assert_eq!(outcome, client::AuthOutcome::Member);
        session
    }

    pub async fn guest(&self, username: &str) -> ClientSession {
        let mut session = self.client().await;
        let outcome = assert_ok!(session.authenticate(username, None).await);
        assert_eq!(outcome, client::AuthOutcome::Guest);
        session
    }

    /// A connection that speaks raw bodies, already logged in as a member
    pub async fn raw_member(&self) -> Transport {
        let mut raw = assert_ok!(Transport::create(SocketKind::Stream, Some(self.client_port)).await);
        assert_ok!(raw.connect(self.client_port).await);

        let encoder = ShiftEncoder::default();
        let body = encode_auth(&encoder.encode(MEMBER.0), Some(&encoder.encode(MEMBER.1)));
        assert_ok!(raw.send(&body).await);
        assert_eq!(assert_ok!(raw.recv().await), "0");
        raw
    }
}

impl Drop for TestSystem {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

pub fn members() -> CredentialStore {
    let encoder = ShiftEncoder::default();
    CredentialStore::from_pairs([(encoder.encode(MEMBER.0), encoder.encode(MEMBER.1))])
}

/// Starts a broker and one backend per partition, waits for the bulk pushes
/// and starts accepting clients
pub async fn start_system(partitions: &[(char, &[(&str, u32)])]) -> TestSystem {
    let mut broker = assert_ok!(
        Broker::bind(
            BrokerPorts {
                backend: 0,
                client: 0
            },
            BackendDirectory::new()
        )
        .await
    );
    let broker_backend_port = assert_ok!(broker.backend_port());

    let mut directory = BackendDirectory::new();
    let mut tasks = Vec::new();

    for (name, rooms) in partitions {
        let name = PartitionKey::new(*name);
        let backend = assert_ok!(
            BackendService::bind(BackendConfig {
                name,
                port: 0,
                broker_port: broker_backend_port,
            })
            .await
        );
        directory.insert(name, assert_ok!(backend.local_port()));

        let inventory = Inventory::from_records(rooms.iter().copied());
        tasks.push(tokio::spawn(async move {
            let _ = backend.run_until(inventory, pending()).await;
        }));
    }

    broker.set_directory(directory.clone());
    let startup_cache = assert_ok!(broker.collect_inventory().await).clone();
    assert_ok!(broker.listen());
    let client_port = assert_ok!(broker.client_port());

    tasks.push(tokio::spawn(async move {
        let _ = broker.run_until(members(), pending()).await;
    }));

    TestSystem {
        client_port,
        broker_backend_port,
        directory,
        startup_cache,
        tasks,
    }
}
