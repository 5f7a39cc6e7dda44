//! Connection registry: every live connection plus the session index.
//!
//! All reads hand back cloned `Arc<Connection>` snapshots; callers send
//! after the lock is released.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use {tokio::sync::RwLock, tracing::debug};

use crate::connection::{ConnId, Connection};

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnId, Arc<Connection>>,
    sessions: HashMap<String, HashSet<ConnId>>,
    /// Reverse index so `unregister` does not scan every session.
    by_conn: HashMap<ConnId, HashSet<String>>,
}

/// What `unregister` took out of the registry.
#[derive(Debug, Default)]
pub struct Removal {
    pub connection: Option<Arc<Connection>>,
    /// Sessions whose last connection this was; they are forgotten.
    pub emptied_sessions: Vec<String>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly accepted connection.
    pub async fn add(&self, conn: Arc<Connection>) {
        self.inner.write().await.connections.insert(conn.id, conn);
    }

    /// Associate a live connection with a session. Returns `true` when the
    /// association is new; unknown connections are ignored.
    pub async fn register(&self, session_id: &str, conn_id: ConnId) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.connections.contains_key(&conn_id) {
            return false;
        }
        let added = inner
            .sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(conn_id);
        if added {
            inner
                .by_conn
                .entry(conn_id)
                .or_default()
                .insert(session_id.to_string());
            debug!(%conn_id, session_id, "registered session");
        }
        added
    }

    /// Drop a connection from the registry and from every session it joined.
    /// Safe to call for connections that were never added.
    pub async fn unregister(&self, conn_id: ConnId) -> Removal {
        let mut inner = self.inner.write().await;
        let mut removal = Removal {
            connection: inner.connections.remove(&conn_id),
            emptied_sessions: Vec::new(),
        };
        if let Some(sessions) = inner.by_conn.remove(&conn_id) {
            for session_id in sessions {
                if let Some(members) = inner.sessions.get_mut(&session_id) {
                    members.remove(&conn_id);
                    if members.is_empty() {
                        inner.sessions.remove(&session_id);
                        removal.emptied_sessions.push(session_id);
                    }
                }
            }
        }
        removal
    }

    pub async fn connections_for(&self, session_id: &str) -> Vec<Arc<Connection>> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(session_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.connections.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn all_connections(&self) -> Vec<Arc<Connection>> {
        self.inner.read().await.connections.values().cloned().collect()
    }

    pub async fn session_ids(&self) -> Vec<String> {
        self.inner.read().await.sessions.keys().cloned().collect()
    }

    /// Every session with its member connections, taken under one read lock.
    pub async fn sessions_snapshot(&self) -> Vec<(String, Vec<Arc<Connection>>)> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .iter()
            .map(|(session_id, ids)| {
                let conns = ids
                    .iter()
                    .filter_map(|id| inner.connections.get(id).cloned())
                    .collect();
                (session_id.clone(), conns)
            })
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}
