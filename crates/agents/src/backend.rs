use {async_trait::async_trait, thiserror::Error};

use nexus_protocol::Event;

/// A chat input forwarded by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub text: String,
    pub session_id: Option<String>,
    pub corr_id: String,
}

/// Why the backend could not produce a reply. The gateway answers every one
/// of these with its echo fallback.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no chat provider configured")]
    NotConfigured,

    #[error("chat provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat provider returned no reply")]
    EmptyReply,
}

/// The downstream service `chat.input` events are forwarded to.
///
/// Replies are events with topic `chat.output` (payload `{text}`),
/// `home.command` (payload `{topic, ...params}`), or other application
/// topics the gateway may ignore.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn handle(&self, request: &ChatRequest) -> Result<Vec<Event>, BackendError>;

    /// Drop any per-session state once the session has ended.
    async fn end_session(&self, _session_id: &str) {}
}
