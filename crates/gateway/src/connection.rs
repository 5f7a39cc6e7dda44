use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};

use tokio::sync::mpsc::{self, error::SendTimeoutError};

/// An outbound message, shared between every recipient of a fan-out. The
/// variant records the WebSocket message kind it goes out as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Self::Text(Arc::from(text))
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self::Text(Arc::from(text))
    }
}

impl From<&[u8]> for Frame {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(Arc::from(bytes))
    }
}

/// Process-unique identifier of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-connection lifecycle. Auth failure goes straight from `Connecting`
/// to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Open,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("{0} is closed")]
    Closed(ConnId),
    #[error("{conn_id} did not accept the frame within {after:?}")]
    Timeout { conn_id: ConnId, after: Duration },
}

// ── Connection ───────────────────────────────────────────────────────────────

/// Handle to a live peer. The socket itself stays with the connection
/// handler; everyone else writes through the bounded outbound channel.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnId,
    pub remote_addr: Option<SocketAddr>,
    sender: mpsc::Sender<Frame>,
    write_timeout: Duration,
}

impl Connection {
    /// Create the handle and the receiver its writer task drains.
    pub fn new(
        id: ConnId,
        remote_addr: Option<SocketAddr>,
        buffer: usize,
        write_timeout: Duration,
    ) -> (Self, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let conn = Self {
            id,
            remote_addr,
            sender,
            write_timeout,
        };
        (conn, receiver)
    }

    /// Queue a frame for this peer, waiting at most the write timeout for
    /// room in its buffer.
    pub async fn send(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.sender
            .send_timeout(frame, self.write_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Closed(_) => DeliveryError::Closed(self.id),
                SendTimeoutError::Timeout(_) => DeliveryError::Timeout {
                    conn_id: self.id,
                    after: self.write_timeout,
                },
            })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
