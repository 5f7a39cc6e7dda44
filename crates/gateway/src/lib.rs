//! Gateway: the event relay every interface and producer connects to.
//!
//! Lifecycle:
//! 1. Load config, resolve the shared token
//! 2. Build the connection registry and the event router (with the chat
//!    backend selected by `gateway.downstream`)
//! 3. Bind the listener and serve `/health` plus the WebSocket upgrade
//! 4. One handler task per connection: auth gate, read loop, writer task
//!
//! The registry is the only shared mutable state; every delivery works on a
//! snapshot of it so a slow peer never stalls registry updates.

pub mod auth;
pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod router;
pub mod server;
pub mod sim;
pub mod state;
pub mod ws;

pub use {
    connection::{ConnId, Connection, DeliveryError, Frame},
    registry::{ConnectionRegistry, Removal},
    router::{EventRouter, Route},
    server::{build_gateway_app, serve, start_gateway},
    state::GatewayState,
};
