use std::time::{SystemTime, UNIX_EPOCH};

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::{meta_keys, payload::Payload};

// ── Meta ─────────────────────────────────────────────────────────────────────

/// Event metadata: the two keys the gateway understands plus anything else
/// the sender attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corr_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for Meta {
    fn from(mut map: Map<String, Value>) -> Self {
        let session_id = take_string(&mut map, meta_keys::SESSION_ID);
        let corr_id = take_string(&mut map, meta_keys::CORR_ID);
        Self {
            session_id,
            corr_id,
            extra: map,
        }
    }
}

/// Non-string ids stay in the open map untouched.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => {
            map.insert(key.to_owned(), other);
            None
        },
    }
}

// ── Event ────────────────────────────────────────────────────────────────────

/// One unit of communication on the wire.
///
/// Events are immutable: fields are only readable, and anything derived from
/// an event is built as a new value through [`Event::builder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    id: String,
    ts: f64,
    #[serde(rename = "type")]
    kind: String,
    source: String,
    targets: Vec<String>,
    topic: String,
    payload: Value,
    meta: Meta,
}

impl Event {
    /// Start building a fresh event. `build()` assigns the id, timestamp and,
    /// unless one is supplied, a correlation id.
    pub fn builder(
        kind: impl Into<String>,
        source: impl Into<String>,
        topic: impl Into<String>,
        payload: Value,
    ) -> EventBuilder {
        EventBuilder {
            kind: kind.into(),
            source: source.into(),
            topic: topic.into(),
            payload,
            targets: Vec::new(),
            meta: Meta::default(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: String,
        ts: f64,
        kind: String,
        source: String,
        targets: Vec<String>,
        topic: String,
        payload: Value,
        meta: Meta,
    ) -> Self {
        Self {
            id,
            ts,
            kind,
            source,
            targets,
            topic,
            payload,
            meta,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation time, fractional seconds since the Unix epoch.
    pub fn ts(&self) -> f64 {
        self.ts
    }

    /// The coarse category, serialized as `type`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn session_id(&self) -> Option<&str> {
        self.meta.session_id.as_deref()
    }

    pub fn corr_id(&self) -> Option<&str> {
        self.meta.corr_id.as_deref()
    }

    /// Typed view of the payload, chosen by topic.
    pub fn typed_payload(&self) -> Payload {
        Payload::parse(&self.topic, &self.payload)
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EventBuilder {
    kind: String,
    source: String,
    topic: String,
    payload: Value,
    targets: Vec<String>,
    meta: Meta,
}

impl EventBuilder {
    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn session(mut self, session_id: Option<&str>) -> Self {
        self.meta.session_id = session_id.map(str::to_owned);
        self
    }

    pub fn corr_id(mut self, corr_id: Option<&str>) -> Self {
        self.meta.corr_id = corr_id.map(str::to_owned);
        self
    }

    /// Attach an extra metadata entry. The reserved keys are routed to their
    /// dedicated fields.
    pub fn meta_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        match value {
            Value::String(s) if key == meta_keys::SESSION_ID => self.meta.session_id = Some(s),
            Value::String(s) if key == meta_keys::CORR_ID => self.meta.corr_id = Some(s),
            value => {
                self.meta.extra.insert(key, value);
            },
        }
        self
    }

    pub fn build(mut self) -> Event {
        if self.meta.corr_id.is_none() {
            self.meta.corr_id = Some(new_id());
        }
        Event {
            id: new_id(),
            ts: now_secs(),
            kind: self.kind,
            source: self.source,
            targets: self.targets,
            topic: self.topic,
            payload: self.payload,
            meta: self.meta,
        }
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
