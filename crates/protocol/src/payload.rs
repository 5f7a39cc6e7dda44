//! Typed views over event payloads.
//!
//! The envelope keeps the payload as raw JSON so unknown topics relay
//! untouched; these types are what the gateway and its collaborators read
//! for the topics they understand.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::topics;

/// Payload of `chat.input`, `chat.output` and `notification` events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub text: String,
}

/// Payload of `grid.tick` events. The producer's counter may skip values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickPayload {
    #[serde(default)]
    pub n: Option<u64>,
    #[serde(default)]
    pub rand: Option<f64>,
}

/// Payload of `home.command` events: a command topic plus free parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl TextPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "text": self.text })
    }
}

impl TickPayload {
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

impl HomeCommand {
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Payload interpreted according to the event's topic.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(TextPayload),
    Tick(TickPayload),
    HomeCommand(HomeCommand),
    /// Unknown topic or a payload that does not fit the topic's shape.
    Other(Value),
}

impl Payload {
    pub fn parse(topic: &str, value: &Value) -> Self {
        let typed = match topic {
            topics::CHAT_INPUT | topics::CHAT_OUTPUT | topics::NOTIFICATION => {
                TextPayload::from_value(value).map(Payload::Text)
            },
            topics::TICK => TickPayload::from_value(value).map(Payload::Tick),
            topics::HOME_COMMAND => HomeCommand::from_value(value).map(Payload::HomeCommand),
            _ => None,
        };
        typed.unwrap_or_else(|| Payload::Other(value.clone()))
    }
}
