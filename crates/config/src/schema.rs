/// Config schema types (gateway, ticker, chat backend, interface client).
use std::{fmt, str::FromStr};

use {
    nexus_protocol::{DEFAULT_PORT, TICK_INTERVAL_MS},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NexusConfig {
    pub gateway: GatewayConfig,
    pub ticker: TickerConfig,
    pub chat: ChatConfig,
    pub interface: InterfaceConfig,
}

/// Where `chat.input` events are forwarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownstreamTarget {
    /// The LLM-backed mini backend.
    #[default]
    Mini,
    /// No backend; every chat input is echoed.
    Echo,
}

impl FromStr for DownstreamTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mini" => Ok(Self::Mini),
            "echo" => Ok(Self::Echo),
            other => Err(format!("unknown downstream target '{other}'")),
        }
    }
}

impl fmt::Display for DownstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mini => f.write_str("mini"),
            Self::Echo => f.write_str("echo"),
        }
    }
}

/// Gateway listener and delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,
    /// Shared secret expected in the `token` query parameter. Absent or empty
    /// disables the check.
    pub token: Option<String>,
    pub downstream: DownstreamTarget,
    /// Upper bound on how long a single delivery may wait on one peer.
    pub write_timeout_ms: u64,
    /// Outbound frames queued per connection before senders start waiting.
    pub outbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            token: None,
            downstream: DownstreamTarget::Mini,
            write_timeout_ms: 5_000,
            outbound_buffer: 256,
        }
    }
}

fn default_url() -> String {
    format!("ws://127.0.0.1:{DEFAULT_PORT}")
}

impl GatewayConfig {
    /// The configured token, treating an empty string as unset.
    pub fn effective_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Grid tick producer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    pub url: String,
    pub interval_ms: u64,
    /// Seed for the `rand` field; random when unset.
    pub seed: Option<u64>,
    pub grid: String,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            interval_ms: TICK_INTERVAL_MS,
            seed: None,
            grid: "main".into(),
        }
    }
}

/// Chat backend (OpenRouter-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub secondary_prompt: String,
    /// Messages of recent conversation kept per session.
    pub memory_size: usize,
    /// Persona names; one is picked per session.
    pub identities: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            system_prompt: "You are Mini GOB, a mid-level fragment of the larger intelligence. \
                            Maintain memory and adapt personality."
                .into(),
            secondary_prompt:
                "Speak like a sarcastic retro hacker, digital resistance style, with wit.".into(),
            memory_size: 5,
            identities: [
                "Ghost Of Brain",
                "Grain Of Being",
                "Glimpse Of Behavior",
                "Glow Of Breath",
                "Glyph Of Balance",
                "Gate Of Becoming",
                "Glint Of Brilliance",
                "Grain Of Balance",
                "Ghost Of Being",
                "Gleam Of Boundaries",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            timeout_secs: 30,
        }
    }
}

impl ChatConfig {
    pub fn effective_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Interactive interface client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    pub id: String,
    pub url: String,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            id: "nano".into(),
            url: default_url(),
        }
    }
}
