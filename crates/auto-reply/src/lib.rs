//! Automatic reply generation, the seam between the router and an AI
//! provider.
//!
//! The router decides *whether* to auto-reply (channel flag + per-conversation
//! takeover state); this crate decides *what* to reply: resolve the channel's
//! agent profile, invoke a [`ReplyGenerator`] under a caller-supplied timeout,
//! and report failures without ever propagating them into the human path.

pub mod agents;
pub mod error;
pub mod generator;

pub use {
    agents::{AgentProfile, AgentRegistry},
    error::{Error, GenerationError, Result},
    generator::{EchoGenerator, ReplyGenerator, generate_with_timeout},
};
