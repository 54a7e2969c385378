//! Per-service client ownership and transport configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use callbridge_core::{CallClient, CallError, CallTransport, ServiceSchema};

const DEFAULT_MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Tuning parameters consumed when constructing per-service transports.
///
/// The adapter layer itself is agnostic to all of these; they are handed to
/// [`CallTransport`] constructors verbatim. Every knob is defaulted and can
/// be overridden through a `CALLBRIDGE_*` environment variable.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint address, e.g. `"localhost:50051"`.
    pub endpoint: String,
    /// Maximum outbound message size in bytes.
    pub max_send_bytes: usize,
    /// Maximum inbound message size in bytes.
    pub max_recv_bytes: usize,
    /// Keepalive probe interval; `None` disables keepalive.
    pub keepalive_interval: Option<Duration>,
    /// How long to wait for a keepalive acknowledgement.
    pub keepalive_timeout: Duration,
    /// How long to wait for the initial connection.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_send_bytes: env_usize("CALLBRIDGE_MAX_SEND_BYTES")
                .unwrap_or(DEFAULT_MAX_MESSAGE_BYTES),
            max_recv_bytes: env_usize("CALLBRIDGE_MAX_RECV_BYTES")
                .unwrap_or(DEFAULT_MAX_MESSAGE_BYTES),
            keepalive_interval: env_secs("CALLBRIDGE_KEEPALIVE_SECS"),
            keepalive_timeout: env_secs("CALLBRIDGE_KEEPALIVE_TIMEOUT_SECS")
                .unwrap_or(Duration::from_secs(20)),
            connect_timeout: env_secs("CALLBRIDGE_CONNECT_TIMEOUT_SECS")
                .unwrap_or(Duration::from_secs(5)),
        }
    }
}

fn default_endpoint() -> String {
    std::env::var("CALLBRIDGE_ENDPOINT").unwrap_or_else(|_| "localhost:50051".to_string())
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Ownership table of per-service clients.
///
/// Lookup misses are `ServiceNotFound`; inserting a duplicate service
/// replaces the previous client.
pub struct ClientRegistry<T: CallTransport> {
    clients: Mutex<HashMap<String, Arc<CallClient<T>>>>,
}

impl<T: CallTransport> ClientRegistry<T> {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Register a client for `schema`'s service, replacing any previous one.
    pub fn insert(&self, schema: ServiceSchema, transport: Arc<T>) -> Arc<CallClient<T>> {
        let service = schema.service().to_string();
        let client = Arc::new(CallClient::new(schema, transport));
        let previous = self
            .clients
            .lock()
            .insert(service.clone(), client.clone());
        if previous.is_some() {
            tracing::debug!(service = %service, "replaced existing client");
        }
        client
    }

    /// Look up the client for a service.
    pub fn client(&self, service: &str) -> Result<Arc<CallClient<T>>, CallError> {
        self.clients
            .lock()
            .get(service)
            .cloned()
            .ok_or_else(|| CallError::ServiceNotFound {
                service: service.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Release every client and clear the table.
    pub fn close(&self) {
        let mut clients = self.clients.lock();
        for (service, client) in clients.drain() {
            tracing::trace!(service = %service, "released client");
            drop(client);
        }
        tracing::debug!("client registry closed");
    }
}

impl<T: CallTransport> Default for ClientRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
