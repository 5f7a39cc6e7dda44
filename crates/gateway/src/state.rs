use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    nexus_agents::{ChatBackend, MiniBackend},
    nexus_config::{DownstreamTarget, GatewayConfig, NexusConfig},
};

use crate::{
    auth::{ResolvedAuth, resolve_auth},
    connection::ConnId,
    registry::ConnectionRegistry,
    router::EventRouter,
};

// ── Gateway state ────────────────────────────────────────────────────────────

/// Shared gateway runtime state, wrapped in Arc for use across async tasks.
pub struct GatewayState {
    /// Live connections and the session index.
    pub registry: Arc<ConnectionRegistry>,
    pub router: EventRouter,
    /// Auth configuration.
    pub auth: ResolvedAuth,
    /// Server version string.
    pub version: String,
    /// Longest a delivery may wait on one peer.
    pub write_timeout: Duration,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
    next_conn_id: AtomicU64,
}

impl GatewayState {
    pub fn new(
        auth: ResolvedAuth,
        backend: Option<Arc<dyn ChatBackend>>,
        config: &GatewayConfig,
    ) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        Arc::new(Self {
            router: EventRouter::new(Arc::clone(&registry), backend),
            registry,
            auth,
            version: env!("CARGO_PKG_VERSION").to_string(),
            write_timeout: Duration::from_millis(config.write_timeout_ms),
            outbound_buffer: config.outbound_buffer,
            next_conn_id: AtomicU64::new(0),
        })
    }

    /// Resolve auth and pick the chat backend from the loaded config.
    pub fn from_config(config: &NexusConfig) -> Arc<Self> {
        let auth = resolve_auth(config.gateway.effective_token().map(str::to_owned));
        let backend: Option<Arc<dyn ChatBackend>> = match config.gateway.downstream {
            DownstreamTarget::Mini => Some(Arc::new(MiniBackend::from_config(&config.chat))),
            DownstreamTarget::Echo => None,
        };
        Self::new(auth, backend, &config.gateway)
    }

    pub fn next_conn_id(&self) -> ConnId {
        ConnId::new(self.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.connection_count().await
    }
}
