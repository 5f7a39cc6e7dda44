//! Routing of decoded inbound events.
//!
//! Rules, first match wins (session binding always runs first):
//! - `interface.input` + `control.*` topic: acknowledge to the sender's session
//! - `grid.tick`: one notification per known session
//! - `interface.input` + `chat.input`: chat backend, echo on failure
//! - anything else: raw relay to every other connection

use std::sync::Arc;

use {
    futures::future::join_all,
    tracing::{debug, warn},
};

use {
    nexus_agents::{ChatBackend, ChatRequest},
    nexus_protocol::{Event, TextPayload, TickPayload, event_types, stylize, topics},
};

use crate::{
    broadcast::{DeliveryReport, deliver, encode_frame, relay_raw, send_to_session},
    connection::{ConnId, Frame},
    registry::{ConnectionRegistry, Removal},
    sim,
};

pub const CONTROL_SOURCE: &str = "nexus:control";
pub const GRID_SOURCE: &str = "nexus:grid";
pub const MINI_SOURCE: &str = "nexus:mini";
pub const ECHO_SOURCE: &str = "nexus:echo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ControlAck,
    Tick,
    Chat,
    Relay,
}

impl Route {
    pub fn classify(event: &Event) -> Self {
        match (event.kind(), event.topic()) {
            (event_types::INTERFACE_INPUT, topic) if topics::is_control(topic) => Self::ControlAck,
            (event_types::GRID_TICK, _) => Self::Tick,
            (event_types::INTERFACE_INPUT, topics::CHAT_INPUT) => Self::Chat,
            _ => Self::Relay,
        }
    }
}

/// What the router did with one inbound event.
#[derive(Debug, Clone, Copy)]
pub struct RouteOutcome {
    pub route: Route,
    pub report: DeliveryReport,
    /// The chat backend was unavailable and the input was echoed back.
    pub echoed: bool,
}

pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    backend: Option<Arc<dyn ChatBackend>>,
}

impl EventRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, backend: Option<Arc<dyn ChatBackend>>) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Forget a closed connection. Sessions it was the last member of are
    /// ended on the chat backend as well.
    pub async fn disconnect(&self, conn_id: ConnId) -> Removal {
        let removal = self.registry.unregister(conn_id).await;
        if let Some(backend) = &self.backend {
            for session_id in &removal.emptied_sessions {
                backend.end_session(session_id).await;
            }
        }
        removal
    }

    /// Route one event that arrived on `origin`. `raw` is the frame exactly
    /// as received, used for the relay fallback.
    pub async fn route(&self, origin: ConnId, raw: Frame, event: &Event) -> RouteOutcome {
        if let Some(session_id) = event.session_id() {
            self.registry.register(session_id, origin).await;
        }

        let route = Route::classify(event);
        debug!(%origin, ?route, kind = event.kind(), topic = event.topic(), "routing event");

        let mut echoed = false;
        let report = match route {
            Route::ControlAck => self.acknowledge_control(event).await,
            Route::Tick => self.fan_out_tick(event).await,
            Route::Chat => {
                let (report, was_echo) = self.forward_chat(event).await;
                echoed = was_echo;
                report
            },
            Route::Relay => relay_raw(&self.registry, origin, raw).await,
        };

        RouteOutcome {
            route,
            report,
            echoed,
        }
    }

    async fn acknowledge_control(&self, event: &Event) -> DeliveryReport {
        let session_id = event.session_id();
        let corr_id = event.corr_id();

        if event.topic() == topics::CONTROL_SESSION_END
            && let (Some(backend), Some(sid)) = (&self.backend, session_id)
        {
            backend.end_session(sid).await;
        }

        let text = stylize(
            &format!("Control ack: {}", event.topic()),
            "ui",
            session_id,
            corr_id,
        );
        let ack = Event::builder(
            event_types::INTERFACE_OUTPUT,
            CONTROL_SOURCE,
            topics::NOTIFICATION,
            TextPayload::new(text).to_value(),
        )
        .session(session_id)
        .corr_id(corr_id)
        .build();
        send_to_session(&self.registry, session_id, &ack).await
    }

    async fn fan_out_tick(&self, event: &Event) -> DeliveryReport {
        let n = TickPayload::from_value(event.payload())
            .and_then(|t| t.n)
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        let corr_id = event.corr_id();

        let sessions = self.registry.sessions_snapshot().await;
        let sends = sessions.into_iter().filter_map(|(session_id, conns)| {
            let text = stylize(&format!("Tick {n}"), "grid", Some(session_id.as_str()), corr_id);
            let note = Event::builder(
                event_types::INTERFACE_OUTPUT,
                GRID_SOURCE,
                topics::NOTIFICATION,
                TextPayload::new(text).to_value(),
            )
            .session(Some(session_id.as_str()))
            .corr_id(corr_id)
            .build();
            let frame = encode_frame(&note)?;
            Some(async move { deliver(&conns, frame).await })
        });

        let mut report = DeliveryReport::default();
        for r in join_all(sends).await {
            report += r;
        }
        debug!(tick = %n, delivered = report.delivered, "tick fanned out");
        report
    }

    async fn forward_chat(&self, event: &Event) -> (DeliveryReport, bool) {
        let text = TextPayload::from_value(event.payload())
            .map(|p| p.text)
            .unwrap_or_default();
        let session_id = event.session_id();
        let request = ChatRequest {
            text,
            session_id: session_id.map(str::to_owned),
            corr_id: event
                .corr_id()
                .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_owned),
        };

        let Some(backend) = &self.backend else {
            return (self.echo(&request).await, true);
        };

        let replies = match backend.handle(&request).await {
            Ok(replies) => replies,
            Err(e) => {
                warn!(session_id = ?request.session_id, error = %e, "chat backend unavailable, echoing");
                return (self.echo(&request).await, true);
            },
        };

        let mut report = DeliveryReport::default();
        for reply in &replies {
            let out = match reply.topic() {
                topics::CHAT_OUTPUT => Some(
                    Event::builder(
                        event_types::INTERFACE_OUTPUT,
                        MINI_SOURCE,
                        topics::CHAT_OUTPUT,
                        reply.payload().clone(),
                    )
                    .session(session_id)
                    .corr_id(reply.corr_id().or(Some(request.corr_id.as_str())))
                    .build(),
                ),
                topics::HOME_COMMAND => sim::render_home_command(reply, session_id),
                other => {
                    debug!(topic = other, "ignoring backend event");
                    None
                },
            };
            if let Some(out) = out {
                report += send_to_session(&self.registry, session_id, &out).await;
            }
        }
        (report, false)
    }

    async fn echo(&self, request: &ChatRequest) -> DeliveryReport {
        let out = Event::builder(
            event_types::INTERFACE_OUTPUT,
            ECHO_SOURCE,
            topics::CHAT_OUTPUT,
            TextPayload::new(request.text.clone()).to_value(),
        )
        .session(request.session_id.as_deref())
        .corr_id(Some(&request.corr_id))
        .build();
        send_to_session(&self.registry, request.session_id.as_deref(), &out).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::connection::Connection,
        async_trait::async_trait,
        nexus_agents::BackendError,
        nexus_protocol::{Payload, decode_slice, encode},
        serde_json::json,
        std::{
            sync::atomic::{AtomicUsize, Ordering},
            time::Duration,
        },
        tokio::sync::mpsc,
    };

    struct Failing;

    #[async_trait]
    impl ChatBackend for Failing {
        async fn handle(&self, _request: &ChatRequest) -> Result<Vec<Event>, BackendError> {
            Err(BackendError::NotConfigured)
        }
    }

    /// Replies with a chat line and a scene command; counts ended sessions.
    #[derive(Default)]
    struct Scripted {
        ended: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for Scripted {
        async fn handle(&self, request: &ChatRequest) -> Result<Vec<Event>, BackendError> {
            let reply = Event::builder(
                "mesh.output",
                "mesh:mini",
                topics::CHAT_OUTPUT,
                json!({"text": format!("re: {}", request.text)}),
            )
            .session(request.session_id.as_deref())
            .corr_id(Some(&request.corr_id))
            .build();
            let scene = Event::builder(
                "mesh.output",
                "mesh:mini",
                topics::HOME_COMMAND,
                json!({"topic": "hass.scene.set", "scene": "movie"}),
            )
            .session(request.session_id.as_deref())
            .corr_id(Some(&request.corr_id))
            .build();
            Ok(vec![reply, scene])
        }

        async fn end_session(&self, _session_id: &str) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        router: EventRouter,
        receivers: Vec<mpsc::Receiver<Frame>>,
    }

    impl Harness {
        async fn new(peers: u64, backend: Option<Arc<dyn ChatBackend>>) -> Self {
            let registry = Arc::new(ConnectionRegistry::new());
            let mut receivers = Vec::new();
            for id in 0..peers {
                let (conn, rx) =
                    Connection::new(ConnId::new(id), None, 16, Duration::from_millis(50));
                registry.add(Arc::new(conn)).await;
                receivers.push(rx);
            }
            Self {
                router: EventRouter::new(registry, backend),
                receivers,
            }
        }

        async fn send(&self, from: u64, event: Event) -> RouteOutcome {
            let raw = Frame::from(encode(&event).unwrap());
            self.router.route(ConnId::new(from), raw, &event).await
        }

        fn drain(&mut self, peer: usize) -> Vec<Event> {
            let mut out = Vec::new();
            while let Ok(frame) = self.receivers[peer].try_recv() {
                out.push(decode_slice(frame.as_bytes()).unwrap());
            }
            out
        }
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

    fn tick(n: u64) -> Event {
        Event::builder(
            event_types::GRID_TICK,
            "grid:loop",
            topics::TICK,
            json!({"n": n, "rand": 0.5}),
        )
        .build()
    }

    fn text(event: &Event) -> String {
        match event.typed_payload() {
            Payload::Text(t) => t.text,
            other => panic!("expected text payload, got {other:?}"),
        }
    }

    #[test]
    fn classify_by_type_and_topic() {
        assert_eq!(
            Route::classify(&input("control.session.end", "A", "")),
            Route::ControlAck
        );
        assert_eq!(Route::classify(&tick(1)), Route::Tick);
        assert_eq!(Route::classify(&input("chat.input", "A", "hi")), Route::Chat);
        assert_eq!(Route::classify(&input("presence.ping", "A", "")), Route::Relay);

        let foreign_control = Event::builder("sensor.reading", "x", "control.reset", json!({})).build();
        assert_eq!(Route::classify(&foreign_control), Route::Relay);
    }

    #[tokio::test]
    async fn binds_session_before_routing() {
        let h = Harness::new(1, None).await;
        h.send(0, input("presence.ping", "S", "")).await;
        assert_eq!(h.router.registry().connections_for("S").await.len(), 1);
    }

    #[tokio::test]
    async fn control_ack_only_to_own_session() {
        let mut h = Harness::new(2, None).await;
        h.send(1, input("presence.ping", "B", "")).await;
        h.drain(0);

        let out = h.send(0, input("control.session.end", "A", "")).await;
        assert_eq!(out.route, Route::ControlAck);
        assert_eq!(out.report.delivered, 1);

        let got = h.drain(0);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].kind(), event_types::INTERFACE_OUTPUT);
        assert_eq!(got[0].topic(), topics::NOTIFICATION);
        assert_eq!(got[0].source(), CONTROL_SOURCE);
        assert!(text(&got[0]).ends_with("Control ack: control.session.end"));
        assert!(h.drain(1).is_empty());
    }

    #[tokio::test]
    async fn session_end_releases_backend_state() {
        let backend = Arc::new(Scripted::default());
        let h = Harness::new(1, Some(Arc::clone(&backend) as Arc<dyn ChatBackend>)).await;
        h.send(0, input("control.session.end", "A", "")).await;
        assert_eq!(backend.ended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_ends_sessions_left_empty() {
        let backend = Arc::new(Scripted::default());
        let h = Harness::new(2, Some(Arc::clone(&backend) as Arc<dyn ChatBackend>)).await;
        h.send(0, input("chat.input", "A", "hi")).await;
        h.send(0, input("presence.ping", "B", "")).await;
        h.send(1, input("presence.ping", "B", "")).await;

        let removal = h.router.disconnect(ConnId::new(0)).await;
        assert_eq!(removal.emptied_sessions, vec!["A".to_string()]);
        assert_eq!(backend.ended.load(Ordering::SeqCst), 1);

        h.router.disconnect(ConnId::new(1)).await;
        assert_eq!(backend.ended.load(Ordering::SeqCst), 2);
        assert_eq!(h.router.registry().session_count().await, 0);
    }

    #[tokio::test]
    async fn tick_reaches_every_session() {
        let mut h = Harness::new(3, None).await;
        h.router.registry().register("S", ConnId::new(0)).await;
        h.router.registry().register("S", ConnId::new(1)).await;
        h.router.registry().register("T", ConnId::new(2)).await;

        let out = h.send(2, tick(42)).await;
        assert_eq!(out.route, Route::Tick);
        assert_eq!(out.report.delivered, 3);

        for peer in 0..3 {
            let got = h.drain(peer);
            assert_eq!(got.len(), 1, "peer {peer}");
            assert_eq!(got[0].source(), GRID_SOURCE);
            assert!(text(&got[0]).ends_with("Tick 42"));
        }
    }

    #[tokio::test]
    async fn tick_without_sessions_goes_nowhere() {
        let mut h = Harness::new(2, None).await;
        let out = h.send(0, tick(1)).await;
        assert_eq!(out.report, DeliveryReport::default());
        assert!(h.drain(1).is_empty());
    }

    #[tokio::test]
    async fn failing_backend_echoes_input() {
        let mut h = Harness::new(2, Some(Arc::new(Failing) as Arc<dyn ChatBackend>)).await;
        h.send(1, input("presence.ping", "B", "")).await;
        h.drain(0);

        let out = h.send(0, input("chat.input", "A", "hello")).await;
        assert!(out.echoed);

        let got = h.drain(0);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].topic(), topics::CHAT_OUTPUT);
        assert_eq!(got[0].source(), ECHO_SOURCE);
        assert_eq!(text(&got[0]), "hello");
        assert!(h.drain(1).is_empty());
    }

    #[tokio::test]
    async fn no_backend_echoes_too() {
        let mut h = Harness::new(1, None).await;
        let out = h.send(0, input("chat.input", "A", "ping")).await;
        assert!(out.echoed);
        assert_eq!(text(&h.drain(0)[0]), "ping");
    }

    #[tokio::test]
    async fn backend_replies_are_rewrapped() {
        let mut h = Harness::new(1, Some(Arc::new(Scripted::default()) as Arc<dyn ChatBackend>))
            .await;
        let input = input("chat.input", "A", "lights please");
        let corr = input.corr_id().unwrap().to_string();
        let out = h.send(0, input).await;
        assert!(!out.echoed);
        assert_eq!(out.report.delivered, 2);

        let got = h.drain(0);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].kind(), event_types::INTERFACE_OUTPUT);
        assert_eq!(got[0].source(), MINI_SOURCE);
        assert_eq!(got[0].topic(), topics::CHAT_OUTPUT);
        assert_eq!(got[0].corr_id(), Some(corr.as_str()));
        assert_eq!(text(&got[0]), "re: lights please");

        assert_eq!(got[1].source(), sim::SIM_SOURCE);
        assert!(text(&got[1]).ends_with("Sim HUD: scene -> 'movie'."));
    }

    #[tokio::test]
    async fn unknown_events_relay_to_others() {
        let mut h = Harness::new(3, None).await;
        let event = Event::builder("sensor.reading", "probe", "temp", json!({"c": 21})).build();
        let out = h.send(0, event.clone()).await;
        assert_eq!(out.route, Route::Relay);
        assert_eq!(out.report.delivered, 2);

        assert!(h.drain(0).is_empty());
        for peer in 1..3 {
            let got = h.drain(peer);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].id(), event.id());
            assert_eq!(got[0].payload(), &json!({"c": 21}));
        }
    }
}
