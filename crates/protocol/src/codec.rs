//! JSON envelope codec.
//!
//! Decoding is tolerant: absent `id`/`ts` get fresh values, absent `source`,
//! `targets`, `payload` and `meta` get empty defaults. Only a record that is
//! not a JSON object, or that lacks `type` or `topic`, is rejected.

use {
    serde::Deserialize,
    serde_json::Value,
    thiserror::Error,
};

use crate::event::{Event, Meta, new_id, now_secs};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
#[error("failed to encode event: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

#[derive(Deserialize)]
struct WireEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    ts: Option<f64>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    targets: Option<Vec<String>>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    meta: Option<Meta>,
}

/// Serialize an event into one text frame.
pub fn encode(event: &Event) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(event)?)
}

pub fn decode(raw: &str) -> Result<Event, DecodeError> {
    decode_slice(raw.as_bytes())
}

pub fn decode_slice(raw: &[u8]) -> Result<Event, DecodeError> {
    let value: Value = serde_json::from_slice(raw)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    let wire: WireEvent = serde_json::from_value(value)?;

    let kind = wire.kind.ok_or(DecodeError::MissingField("type"))?;
    let topic = wire.topic.ok_or(DecodeError::MissingField("topic"))?;

    Ok(Event::from_parts(
        wire.id.unwrap_or_else(new_id),
        wire.ts.unwrap_or_else(now_secs),
        kind,
        wire.source.unwrap_or_default(),
        wire.targets.unwrap_or_default(),
        topic,
        wire.payload,
        wire.meta.unwrap_or_default(),
    ))
}
