//! WhatsApp channel: a QR-paired connection over a swappable transport.
//!
//! The [`Transport`] trait isolates the actual WhatsApp wire protocol; the
//! [`WhatsAppConnection`] supervises the session lifecycle: QR pairing,
//! reconnection with backoff, and the terminal logged-out state.

pub mod connection;
pub mod translate;
pub mod transport;

pub use {
    connection::{WhatsAppConnection, WhatsAppFactory},
    translate::WhatsAppTranslator,
    transport::{Session, Transport, TransportEvent, UnconfiguredTransport},
};
