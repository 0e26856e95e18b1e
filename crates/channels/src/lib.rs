//! Channel connection system.
//!
//! Each messaging surface (WhatsApp, WeChat, web widget, …) implements the
//! [`ChannelConnection`] trait; the [`ConnectionRegistry`] owns at most one
//! live connection per channel id and pumps connection events into the
//! router through a [`ConnectionEventSink`].

pub mod backoff;
pub mod connection;
pub mod error;
pub mod pairing;
pub mod registry;
pub mod store;

pub use {
    backoff::Backoff,
    connection::{
        ChannelConnection, ConnectionEvent, ConnectionEventSink, ConnectionFactory, PairingHandle,
        PairingSupport,
    },
    error::{Error, Result},
    pairing::{PairingFlow, PairingState},
    registry::ConnectionRegistry,
    store::{ChannelStore, MemoryChannelStore},
};
