//! End-to-end discovery against a live TCP configuration endpoint.
//!
//! A scripted server speaks the text configuration protocol; the client is
//! expected to pick up membership changes across polls and to ignore stale
//! versions, all without a custom transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time;

use memfleet::{
    ClusterClient, ClusterConfig, ConstructionError, NodeAddress, NodeConnection, NodeFactory,
};

#[derive(Debug)]
struct FakeConnection {
    address: NodeAddress,
}

impl NodeConnection for FakeConnection {
    fn address(&self) -> &NodeAddress {
        &self.address
    }
}

#[derive(Default)]
struct CountingFactory {
    calls: AtomicUsize,
}

#[async_trait]
impl NodeFactory for CountingFactory {
    async fn create(
        &self,
        address: &NodeAddress,
    ) -> Result<Arc<dyn NodeConnection>, ConstructionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeConnection {
            address: address.clone(),
        }))
    }
}

/// Configuration endpoint serving whatever payload is currently installed.
struct ConfigServer {
    payload: Arc<Mutex<String>>,
    port: u16,
}

impl ConfigServer {
    async fn start(initial_payload: &str) -> Self {
        let payload = Arc::new(Mutex::new(initial_payload.to_string()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let served = payload.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let served = served.clone();
                tokio::spawn(async move {
                    let mut command = Vec::new();
                    let mut byte = [0u8; 1];
                    while !command.ends_with(b"\r\n") {
                        match socket.read(&mut byte).await {
                            Ok(0) | Err(_) => return,
                            Ok(_) => command.extend_from_slice(&byte),
                        }
                    }
                    assert_eq!(command, b"config get cluster\r\n");

                    let payload = served.lock().clone();
                    let response = format!(
                        "CONFIG cluster 0 {}\r\n{}\r\nEND\r\n",
                        payload.len(),
                        payload
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        Self { payload, port }
    }

    fn install(&self, payload: &str) {
        *self.payload.lock() = payload.to_string();
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within three seconds");
}

#[tokio::test]
async fn tracks_membership_across_resizes() {
    let server = ConfigServer::start("1\na|10.0.0.1|11211 b|10.0.0.2|11211\n").await;
    let factory = Arc::new(CountingFactory::default());

    let config = ClusterConfig::new("127.0.0.1", server.port)
        .with_poll_interval(Duration::from_millis(40))
        .with_retries(3, Duration::from_millis(20))
        .with_node_factory(factory.clone());
    let client = ClusterClient::start(config).unwrap();

    // First poll fires immediately and primes the pool.
    wait_until(|| client.pool().len() == 2).await;
    assert_eq!(client.topology_version(), 1);
    assert!(!client.degraded());
    assert!(client.lookup(b"user:42").is_some());

    // The cluster grows; the next poll picks it up.
    server.install("2\na|10.0.0.1|11211 b|10.0.0.2|11211 c|10.0.0.3|11211\n");
    wait_until(|| client.pool().len() == 3).await;
    assert_eq!(client.topology_version(), 2);
    assert_eq!(factory.calls.load(Ordering::SeqCst), 3);

    // A stale version must not shrink the pool.
    server.install("1\na|10.0.0.1|11211\n");
    time::sleep(Duration::from_millis(150)).await;
    assert_eq!(client.pool().len(), 3);
    assert_eq!(client.topology_version(), 2);

    // A genuine shrink is applied, and surviving nodes keep serving.
    server.install("3\na|10.0.0.1|11211 c|10.0.0.3|11211\n");
    wait_until(|| client.pool().len() == 2).await;
    assert_eq!(client.topology_version(), 3);
    for n in 0..50 {
        let owner = client.lookup(format!("key-{n}").as_bytes()).unwrap();
        assert_ne!(owner.address().host, "10.0.0.2");
    }

    client.shutdown().await;
}

#[tokio::test]
async fn survives_a_bootstrap_outage() {
    let server = ConfigServer::start("1\na|10.0.0.1|11211\n").await;
    let factory = Arc::new(CountingFactory::default());

    // Point at a dead port first: discovery degrades but never gives up.
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    };

    let config = ClusterConfig::new("127.0.0.1", dead)
        .with_poll_interval(Duration::from_millis(40))
        .with_retries(2, Duration::from_millis(20))
        .with_connect_timeout(Duration::from_millis(100))
        .with_node_factory(factory.clone());
    let client = ClusterClient::start(config).unwrap();

    wait_until(|| client.degraded()).await;
    assert!(client.lookup(b"anything").is_none());
    client.shutdown().await;

    // The same settings against a live endpoint prime immediately.
    let config = ClusterConfig::new("127.0.0.1", server.port)
        .with_poll_interval(Duration::from_millis(40))
        .with_retries(2, Duration::from_millis(20))
        .with_node_factory(factory);
    let client = ClusterClient::start(config).unwrap();

    wait_until(|| client.pool().len() == 1).await;
    assert!(!client.degraded());
    client.shutdown().await;
}
