//! HTTP gateway: wires the channel registry, conversation store, and message
//! router together and exposes them over an axum API.

pub mod agents;
pub mod channels;
pub mod conversations;
pub mod error;
pub mod factory;
pub mod server;
pub mod state;
pub mod webhooks;

pub use {
    error::ApiError,
    factory::SwitchboardFactory,
    server::{build_app, start_gateway},
    state::{AppState, wire},
};
