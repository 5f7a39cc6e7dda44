//! End-to-end tests: a real gateway on an ephemeral port, driven by
//! WebSocket clients.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    futures::{SinkExt, StreamExt, future::join_all},
    serde_json::json,
    tokio::{net::TcpStream, time::timeout},
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
};

use {
    nexus_agents::{BackendError, ChatBackend, ChatMessage, ChatRequest, LlmProvider, MiniBackend},
    nexus_config::{ChatConfig, GatewayConfig},
    nexus_gateway::{GatewayState, auth::resolve_auth, serve},
    nexus_protocol::{Event, Payload, decode, encode, event_types, topics},
};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const QUIET: Duration = Duration::from_millis(200);

struct Failing;

#[async_trait]
impl ChatBackend for Failing {
    async fn handle(&self, _request: &ChatRequest) -> Result<Vec<Event>, BackendError> {
        Err(BackendError::EmptyReply)
    }
}

/// Provider that always answers "sure".
struct Canned;

#[async_trait]
impl LlmProvider for Canned {
    fn name(&self) -> &str {
        "canned"
    }

    fn id(&self) -> &str {
        "canned-1"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, BackendError> {
        Ok("sure".into())
    }
}

async fn start(
    token: Option<&str>,
    backend: Option<Arc<dyn ChatBackend>>,
) -> (SocketAddr, Arc<GatewayState>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = GatewayState::new(
        resolve_auth(token.map(str::to_owned)),
        backend,
        &GatewayConfig::default(),
    );
    tokio::spawn(serve(listener, Arc::clone(&state)));
    (addr, state)
}

async fn connect(addr: SocketAddr, token: Option<&str>) -> Ws {
    let url = match token {
        Some(t) => format!("ws://{addr}/ws?token={t}"),
        None => format!("ws://{addr}/ws"),
    };
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send(ws: &mut Ws, event: &Event) {
    ws.send(Message::text(encode(event).unwrap())).await.unwrap();
}

/// Next event within `wait`, skipping non-text frames.
async fn recv_within(ws: &mut Ws, wait: Duration) -> Option<Event> {
    loop {
        match timeout(wait, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(decode(text.as_str()).unwrap()),
            Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) | Err(_) => return None,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

async fn recv(ws: &mut Ws) -> Event {
    recv_within(ws, Duration::from_secs(5)).await.expect("expected an event")
}

fn input(topic: &str, session: &str, text: &str) -> Event {
    Event::builder(
        event_types::INTERFACE_INPUT,
        "interface:test",
        topic,
        json!({"text": text}),
    )
    .session(Some(session))
    .build()
}

fn text(event: &Event) -> String {
    match event.typed_payload() {
        Payload::Text(t) => t.text,
        other => panic!("expected text payload, got {other:?}"),
    }
}

/// Bind the connection to `session` and wait for the acknowledgement, so the
/// registration is known to have happened.
async fn join(ws: &mut Ws, session: &str) {
    send(ws, &input("control.hello", session, "")).await;
    let ack = recv(ws).await;
    assert_eq!(ack.topic(), topics::NOTIFICATION);
    assert_eq!(ack.session_id(), Some(session));
}

#[tokio::test]
async fn wrong_token_is_closed_with_policy_violation() {
    let (addr, state) = start(Some("secret"), None).await;
    let mut ws = connect(addr, Some("wrong")).await;

    let frame = timeout(Duration::from_secs(5), ws.next()).await.unwrap();
    match frame {
        Some(Ok(Message::Close(Some(close)))) => {
            assert_eq!(u16::from(close.code), 1008);
            assert_eq!(close.reason.as_str(), "Unauthorized");
        },
        other => panic!("expected close frame, got {other:?}"),
    }
    assert_eq!(state.connection_count().await, 0);
    assert_eq!(state.registry.session_count().await, 0);
}

#[tokio::test]
async fn repeated_token_param_still_gets_policy_close() {
    let (addr, state) = start(Some("secret"), None).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws?token=a&token=b"))
        .await
        .unwrap();

    let frame = timeout(Duration::from_secs(5), ws.next()).await.unwrap();
    match frame {
        Some(Ok(Message::Close(Some(close)))) => assert_eq!(u16::from(close.code), 1008),
        other => panic!("expected close frame, got {other:?}"),
    }
    assert_eq!(state.connection_count().await, 0);
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let (addr, state) = start(Some("secret"), None).await;
    let mut ws = connect(addr, None).await;
    assert!(recv_within(&mut ws, Duration::from_secs(2)).await.is_none());
    assert_eq!(state.connection_count().await, 0);
}

#[tokio::test]
async fn right_token_proceeds() {
    let (addr, _state) = start(Some("secret"), None).await;
    let mut ws = connect(addr, Some("secret")).await;
    join(&mut ws, "A").await;
}

#[tokio::test]
async fn session_membership_follows_connection_lifetime() {
    let (addr, state) = start(None, None).await;
    let mut ws = connect(addr, None).await;
    join(&mut ws, "S").await;
    assert_eq!(state.registry.connections_for("S").await.len(), 1);

    ws.close(None).await.unwrap();
    drop(ws);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !state.registry.connections_for("S").await.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "session never released");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.connection_count().await, 0);
}

#[tokio::test]
async fn closing_without_session_end_releases_chat_state() {
    let backend = Arc::new(MiniBackend::new(
        Some(Arc::new(Canned) as Arc<dyn LlmProvider>),
        &ChatConfig::default(),
    ));
    let (addr, _state) = start(None, Some(Arc::clone(&backend) as Arc<dyn ChatBackend>)).await;
    let mut ws = connect(addr, None).await;

    send(&mut ws, &input(topics::CHAT_INPUT, "S", "hello")).await;
    assert_eq!(text(&recv(&mut ws).await), "sure");
    assert_eq!(backend.session_count().await, 1);

    ws.close(None).await.unwrap();
    drop(ws);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while backend.session_count().await != 0 {
        assert!(tokio::time::Instant::now() < deadline, "chat state never released");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn binary_frames_are_relayed_as_binary() {
    let (addr, _state) = start(None, None).await;
    let mut sender = connect(addr, None).await;
    let mut listener = connect(addr, None).await;
    join(&mut sender, "bin-a").await;
    join(&mut listener, "bin-b").await;

    let raw = encode(&Event::builder("sensor.reading", "probe", "temp", json!({"c": 4})).build())
        .unwrap();
    sender.send(Message::binary(raw.clone().into_bytes())).await.unwrap();

    match timeout(Duration::from_secs(5), listener.next()).await.unwrap() {
        Some(Ok(Message::Binary(bytes))) => assert_eq!(&bytes[..], raw.as_bytes()),
        other => panic!("expected binary frame, got {other:?}"),
    }
}

#[tokio::test]
async fn tick_reaches_each_connection_of_the_session_once() {
    let (addr, _state) = start(None, None).await;
    let mut first = connect(addr, None).await;
    let mut second = connect(addr, None).await;
    let mut producer = connect(addr, None).await;
    join(&mut first, "S").await;
    join(&mut second, "S").await;
    // The second join also acknowledged to the first connection.
    assert_eq!(recv(&mut first).await.topic(), topics::NOTIFICATION);

    let tick = Event::builder(
        event_types::GRID_TICK,
        "grid:loop",
        topics::TICK,
        json!({"n": 7, "rand": 0.25}),
    )
    .build();
    send(&mut producer, &tick).await;

    for ws in [&mut first, &mut second] {
        let note = recv(ws).await;
        assert_eq!(note.kind(), event_types::INTERFACE_OUTPUT);
        assert_eq!(note.topic(), topics::NOTIFICATION);
        assert!(text(&note).ends_with("Tick 7"), "{}", text(&note));
        assert!(recv_within(ws, QUIET).await.is_none());
    }
    assert!(recv_within(&mut producer, QUIET).await.is_none());
}

#[tokio::test]
async fn control_ack_goes_only_to_its_session() {
    let (addr, _state) = start(None, None).await;
    let mut a = connect(addr, None).await;
    let mut b = connect(addr, None).await;
    join(&mut a, "A").await;
    join(&mut b, "B").await;

    send(&mut a, &input(topics::CONTROL_SESSION_END, "A", "")).await;
    let ack = recv(&mut a).await;
    assert!(text(&ack).ends_with("Control ack: control.session.end"));
    assert!(recv_within(&mut a, QUIET).await.is_none());
    assert!(recv_within(&mut b, QUIET).await.is_none());
}

#[tokio::test]
async fn failing_backend_echoes_to_sender_only() {
    let (addr, _state) = start(None, Some(Arc::new(Failing) as Arc<dyn ChatBackend>)).await;
    let mut a = connect(addr, None).await;
    let mut b = connect(addr, None).await;
    join(&mut a, "A").await;
    join(&mut b, "B").await;

    send(&mut a, &input(topics::CHAT_INPUT, "A", "hello")).await;
    let out = recv(&mut a).await;
    assert_eq!(out.topic(), topics::CHAT_OUTPUT);
    assert_eq!(text(&out), "hello");
    assert!(recv_within(&mut a, QUIET).await.is_none());
    assert!(recv_within(&mut b, QUIET).await.is_none());
}

#[tokio::test]
async fn undecodable_frames_keep_connection_open() {
    let (addr, _state) = start(None, None).await;
    let mut ws = connect(addr, None).await;
    ws.send(Message::text("definitely not json")).await.unwrap();
    ws.send(Message::text(r#"{"type":"interface.input"}"#)).await.unwrap();
    join(&mut ws, "A").await;
}

#[tokio::test]
async fn unknown_events_relay_to_other_connections() {
    let (addr, _state) = start(None, None).await;
    let mut sender = connect(addr, None).await;
    let mut listener = connect(addr, None).await;
    // Make sure both handlers are registered before relaying.
    join(&mut sender, "relay-a").await;
    join(&mut listener, "relay-b").await;

    let event = Event::builder("sensor.reading", "probe", "temp", json!({"c": 21})).build();
    send(&mut sender, &event).await;

    let got = recv(&mut listener).await;
    assert_eq!(got.id(), event.id());
    assert_eq!(got.payload(), &json!({"c": 21}));
    assert!(recv_within(&mut sender, QUIET).await.is_none());
}

#[tokio::test]
async fn hundred_sessions_do_not_leak() {
    let (addr, _state) = start(None, None).await;

    let clients = (0..100).map(|i| async move {
        let session = format!("s{i}");
        let mut ws = connect(addr, None).await;
        join(&mut ws, &session).await;
        (session, ws)
    });
    let mut clients = join_all(clients).await;

    join_all(clients.iter_mut().map(|(session, ws)| async move {
        send(ws, &input(topics::CHAT_INPUT, session, &format!("msg-{session}"))).await;
    }))
    .await;

    let results = join_all(clients.iter_mut().map(|(session, ws)| async move {
        let out = recv(ws).await;
        assert_eq!(out.session_id(), Some(session.as_str()));
        assert_eq!(text(&out), format!("msg-{session}"));
        assert!(recv_within(ws, QUIET).await.is_none());
    }))
    .await;
    assert_eq!(results.len(), 100);
}

#[tokio::test]
async fn health_reports_connections() {
    let (addr, _state) = start(None, None).await;
    let mut ws = connect(addr, None).await;
    join(&mut ws, "A").await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
    assert_eq!(body["sessions"], 1);
}
