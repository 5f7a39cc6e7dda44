//! Delivery of encoded frames to registry snapshots.

use std::{ops::AddAssign, sync::Arc};

use {
    futures::future::join_all,
    tracing::{debug, warn},
};

use nexus_protocol::{Event, encode};

use crate::{
    connection::{ConnId, Connection, Frame},
    registry::ConnectionRegistry,
};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl AddAssign for DeliveryReport {
    fn add_assign(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Encode an event once for every recipient.
pub fn encode_frame(event: &Event) -> Option<Frame> {
    match encode(event) {
        Ok(json) => Some(Frame::from(json)),
        Err(e) => {
            warn!(topic = event.topic(), error = %e, "failed to encode event");
            None
        },
    }
}

/// Send `frame` to every recipient concurrently. A failure on one peer is
/// logged and does not affect the rest.
pub async fn deliver(recipients: &[Arc<Connection>], frame: Frame) -> DeliveryReport {
    let sends = recipients.iter().map(|conn| {
        let frame = frame.clone();
        async move { conn.send(frame).await }
    });

    let mut report = DeliveryReport::default();
    for result in join_all(sends).await {
        match result {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(error = %e, "delivery failed");
                report.failed += 1;
            },
        }
    }
    report
}

/// Deliver an event to every connection currently registered under
/// `session_id`. Unknown or absent sessions drop the event.
pub async fn send_to_session(
    registry: &ConnectionRegistry,
    session_id: Option<&str>,
    event: &Event,
) -> DeliveryReport {
    let Some(session_id) = session_id else {
        debug!(topic = event.topic(), "no session on outbound event, dropping");
        return DeliveryReport::default();
    };
    let recipients = registry.connections_for(session_id).await;
    if recipients.is_empty() {
        debug!(session_id, topic = event.topic(), "no connections for session, dropping");
        return DeliveryReport::default();
    }
    match encode_frame(event) {
        Some(frame) => deliver(&recipients, frame).await,
        None => DeliveryReport::default(),
    }
}

/// Relay an inbound frame untouched to every connection except its sender.
/// Binary frames go out as binary.
pub async fn relay_raw(registry: &ConnectionRegistry, origin: ConnId, frame: Frame) -> DeliveryReport {
    let recipients: Vec<_> = registry
        .all_connections()
        .await
        .into_iter()
        .filter(|c| c.id != origin)
        .collect();
    deliver(&recipients, frame).await
}
