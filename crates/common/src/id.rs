//! Id generation and the process-wide append sequence.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

/// Generate a prefixed unique id, e.g. `msg-7f3a…`.
#[must_use]
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

/// Current unix time in milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

static SEQ: AtomicU64 = AtomicU64::new(1);

/// Next value of the process-wide monotonic sequence.
///
/// Used as the secondary sort key for messages whose `created_at`
/// timestamps collide.
#[must_use]
pub fn next_seq() -> u64 {
    SEQ.fetch_add(1, Ordering::Relaxed)
}
