//! Shared types and utilities used across all switchboard crates.

pub mod id;
pub mod types;

pub use id::{new_id, next_seq, now_ms};
