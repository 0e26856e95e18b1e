//! Web chat widget channel.
//!
//! The widget has no long-lived socket of its own: visitors post messages
//! through the gateway webhook, and replies are parked in a per-connection
//! outbox the widget frontend polls. The connection is online from the
//! moment it connects until it is torn down.

pub mod connection;
pub mod translate;

pub use {
    connection::{WidgetConnection, WidgetFactory},
    translate::WidgetTranslator,
};
