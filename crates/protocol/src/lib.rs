//! Wire protocol shared by the gateway, its producers and its interfaces.
//!
//! Every message on a nexus connection is one JSON-encoded [`Event`]:
//!
//! ```text
//! { "id": string, "ts": number, "type": string, "source": string,
//!   "targets": [string...], "topic": string, "payload": any, "meta": {string: any} }
//! ```

pub mod codec;
pub mod event;
pub mod payload;
pub mod style;

pub use {
    codec::{DecodeError, EncodeError, decode, decode_slice, encode},
    event::{Event, EventBuilder, Meta},
    payload::{HomeCommand, Payload, TextPayload, TickPayload},
    style::stylize,
};

pub const PROTOCOL_VERSION: u32 = 1;

/// Default interval between `grid.tick` events.
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Default gateway listen port.
pub const DEFAULT_PORT: u16 = 7000;

/// Query parameter carrying the shared secret on connect.
pub const TOKEN_PARAM: &str = "token";

pub mod close_codes {
    /// RFC 6455 policy violation; sent when the connect token is rejected.
    pub const POLICY_VIOLATION: u16 = 1008;
}

pub mod event_types {
    pub const INTERFACE_INPUT: &str = "interface.input";
    pub const INTERFACE_OUTPUT: &str = "interface.output";
    pub const GRID_TICK: &str = "grid.tick";
}

pub mod topics {
    pub const CHAT_INPUT: &str = "chat.input";
    pub const CHAT_OUTPUT: &str = "chat.output";
    pub const HOME_COMMAND: &str = "home.command";
    pub const NOTIFICATION: &str = "notification";
    pub const TICK: &str = "tick";

    /// Prefix shared by every control topic (`control.session.end`, ...).
    pub const CONTROL_PREFIX: &str = "control.";
    pub const CONTROL_SESSION_END: &str = "control.session.end";

    pub fn is_control(topic: &str) -> bool {
        topic.starts_with(CONTROL_PREFIX)
    }
}

pub mod meta_keys {
    pub const SESSION_ID: &str = "session_id";
    pub const CORR_ID: &str = "corr_id";
}
