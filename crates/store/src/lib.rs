//! Canonical conversation and message storage.
//!
//! Conversations are serialized per-conversation (one async lock each, so
//! appends to different conversations run in parallel) and optionally
//! journaled as JSONL files (one file per conversation) with file locking.
//! The journal is replayed on open, so append-only history and the
//! manual-takeover flag survive restarts.

pub mod error;
pub mod journal;
pub mod store;

pub use {
    error::{Error, Result},
    journal::{Journal, JournalRecord},
    store::{AppendOutcome, ConversationFilter, ConversationStore},
};
