//! Chat backend for `chat.input` events: LLM providers, per-session memory,
//! prompt assembly and home-automation intents.

pub mod backend;
pub mod intent;
pub mod memory;
pub mod mini;
pub mod model;
pub mod prompt;
pub mod providers;

pub use {
    backend::{BackendError, ChatBackend, ChatRequest},
    mini::MiniBackend,
    model::{ChatMessage, LlmProvider, Role},
};
