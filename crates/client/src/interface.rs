//! Client SDK for chat front-ends ("interfaces").

use {
    futures::{SinkExt, StreamExt},
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tokio::net::TcpStream,
    tokio_tungstenite::{
        MaybeTlsStream, WebSocketStream, connect_async,
        tungstenite::{self, Message},
    },
    tracing::{debug, info},
};

use {
    nexus_config::InterfaceConfig,
    nexus_protocol::{EncodeError, Event, decode, encode, event_types, topics},
};

use crate::with_token;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid gateway url: {0}")]
    Url(#[from] url::ParseError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("not connected")]
    NotConnected,
}

/// One interface attached to one logical session.
pub struct InterfaceClient {
    interface_id: String,
    session_id: String,
    url: String,
    token: Option<Secret<String>>,
    ws: Option<WsStream>,
}

impl InterfaceClient {
    /// New client with a fresh random session id.
    pub fn new(interface_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            interface_id: interface_id.into(),
            session_id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            token: None,
            ws: None,
        }
    }

    pub fn from_config(config: &InterfaceConfig) -> Self {
        Self::new(config.id.clone(), config.url.clone())
    }

    /// Join an existing session instead of starting a new one.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty()).map(Secret::new);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_some()
    }

    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let url = with_token(
            &self.url,
            self.token.as_ref().map(|t| t.expose_secret().as_str()),
        )?;
        let (ws, _) = connect_async(url.as_str()).await?;
        info!(
            interface = %self.interface_id,
            session_id = %self.session_id,
            url = %self.url,
            "connected to gateway"
        );
        self.ws = Some(ws);
        Ok(())
    }

    /// Send user text as a `chat.input` event for this session.
    pub async fn publish_input(&mut self, text: &str) -> Result<(), ClientError> {
        let event = self.input_event(topics::CHAT_INPUT, json!({ "text": text }));
        self.send(&event).await
    }

    /// Send a `control.<name>` event, e.g. `session.end` or `mode.set`.
    pub async fn send_control(&mut self, name: &str, payload: Value) -> Result<(), ClientError> {
        let topic = format!("{}{name}", topics::CONTROL_PREFIX);
        let event = self.input_event(&topic, payload);
        self.send(&event).await
    }

    /// Wait for the next `interface.output` addressed to this session.
    ///
    /// Frames that do not decode, and outputs for other sessions, are
    /// skipped. Returns `Ok(None)` once the gateway closes the connection.
    pub async fn recv_output(&mut self) -> Result<Option<Event>, ClientError> {
        let ws = self.ws.as_mut().ok_or(ClientError::NotConnected)?;
        while let Some(msg) = ws.next().await {
            let raw = match msg? {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    debug!(?frame, "gateway closed the connection");
                    return Ok(None);
                },
                _ => continue,
            };
            let event = match decode(raw.as_str()) {
                Ok(event) => event,
                Err(e) => {
                    debug!(error = %e, "skipping undecodable frame");
                    continue;
                },
            };
            if event.kind() == event_types::INTERFACE_OUTPUT
                && event.session_id() == Some(self.session_id.as_str())
            {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    pub async fn close(&mut self) -> Result<(), ClientError> {
        if let Some(mut ws) = self.ws.take() {
            ws.close(None).await?;
        }
        Ok(())
    }

    fn input_event(&self, topic: &str, payload: Value) -> Event {
        Event::builder(
            event_types::INTERFACE_INPUT,
            format!("interface:{}", self.interface_id),
            topic,
            payload,
        )
        .session(Some(self.session_id.as_str()))
        .build()
    }

    async fn send(&mut self, event: &Event) -> Result<(), ClientError> {
        let ws = self.ws.as_mut().ok_or(ClientError::NotConnected)?;
        ws.send(Message::text(encode(event)?)).await?;
        Ok(())
    }
}
