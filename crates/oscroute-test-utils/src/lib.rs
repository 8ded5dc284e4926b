//! Common test helpers for oscroute tests
//!
//! - Condition-based waiting and bounded reads (no hardcoded sleeps)
//! - Idempotent tracing setup
//! - A [`TestServer`] that shuts down on drop

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use oscroute_core::{Descriptor, Value};
use oscroute_router::{Client, Route, Server, ServerConfig, Sub, SubsStream};
use oscroute_transport::LoopbackTransport;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for a single awaited step in a test
pub const TEST_TIMEOUT: Duration = DEFAULT_TIMEOUT;

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Install a fmt subscriber filtered by `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Read up to `n` value lists, stopping early on unsubscribe or timeout
pub async fn collect(sub: &Sub, n: usize, max_wait: Duration) -> Vec<Vec<Value>> {
    let mut items = Vec::with_capacity(n);
    let deadline = Instant::now() + max_wait;
    while items.len() < n {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, sub.next()).await {
            Ok(Some(values)) => items.push(values),
            Ok(None) | Err(_) => break,
        }
    }
    items
}

/// Read until the sequence ends; `None` if it does not end in time
pub async fn collect_to_end(sub: &Sub, max_wait: Duration) -> Option<Vec<Vec<Value>>> {
    timeout(max_wait, sub.stream().collect::<Vec<_>>()).await.ok()
}

/// Read up to `n` merged items, stopping early when the merge ends
pub async fn collect_merged(
    stream: &mut SubsStream,
    n: usize,
    max_wait: Duration,
) -> Vec<(Route, Vec<Value>)> {
    let mut items = Vec::with_capacity(n);
    let deadline = Instant::now() + max_wait;
    while items.len() < n {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, stream.next()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) | Err(_) => break,
        }
    }
    items
}

/// A running server that shuts down on drop
pub struct TestServer {
    server: Arc<Server>,
    handle: Option<JoinHandle<oscroute_router::Result<()>>>,
}

impl TestServer {
    /// Start a server on an ephemeral loopback address, not yet bound
    pub async fn start() -> Self {
        let server = Arc::new(
            Server::new(ServerConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                name: "test-server".to_string(),
                ..Default::default()
            })
            .unwrap(),
        );
        let handle = server.spawn();
        let running = {
            let server = server.clone();
            wait_for(
                move || {
                    let server = server.clone();
                    async move { server.is_running() }
                },
                DEFAULT_CHECK_INTERVAL,
                DEFAULT_TIMEOUT,
            )
            .await
        };
        assert!(running, "test server did not start");
        Self {
            server,
            handle: Some(handle),
        }
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Serve a route on the running server
    pub fn route(&self, path: &str, typespec: impl Into<Descriptor>) -> Route {
        self.server.route_path(path, typespec).unwrap()
    }

    /// A client wired to the server in-process
    pub fn client(&self) -> Client<LoopbackTransport> {
        Client::new(self.server.loopback())
    }

    /// Shut down and wait for the server task
    pub async fn stop(mut self) {
        self.server.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = timeout(DEFAULT_TIMEOUT, handle).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.shutdown();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
