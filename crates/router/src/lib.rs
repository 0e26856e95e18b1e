//! Inbound/outbound message routing: the glue between channel connections,
//! the conversation store, and auto-reply.
//!
//! Flow: connection event → translate provider payload → dedup transport id →
//! append to the owning conversation → maybe auto-reply → send back out
//! through the owning channel's connection.

pub mod error;
pub mod router;
pub mod translate;

pub use {
    error::{Error, Result},
    router::{MessageRouter, RouterConfig},
    translate::{NormalizedInbound, PayloadTranslator, TranslatorRegistry},
};
