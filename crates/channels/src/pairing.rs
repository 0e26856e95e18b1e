//! QR pairing state machine with a bounded validity window.

use {std::time::Duration, tokio::time::Instant};

use crate::{Error, PairingHandle, Result};

/// Default validity window for a pairing token.
pub const DEFAULT_PAIRING_TTL: Duration = Duration::from_secs(60);

/// Pairing lifecycle of one channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingState {
    Idle,
    AwaitingScan,
    Paired,
    Expired,
    Failed,
}

/// Tracks the current pairing token and its deadline for one connection.
///
/// Uses `tokio::time::Instant` so expiry is test-controllable with paused
/// time.
#[derive(Debug)]
pub struct PairingFlow {
    state: PairingState,
    token: Option<String>,
    deadline: Option<Instant>,
    ttl: Duration,
}

impl PairingFlow {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: PairingState::Idle,
            token: None,
            deadline: None,
            ttl,
        }
    }

    #[must_use]
    pub fn state(&self) -> PairingState {
        self.state
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Deadline of the token currently awaiting a scan, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        (self.state == PairingState::AwaitingScan)
            .then_some(self.deadline)
            .flatten()
    }

    /// Issue a fresh token and arm the expiry deadline. Valid from `Idle`,
    /// `Expired`, or `Failed` (retry with a fresh token), and from
    /// `AwaitingScan` (supersedes the previous token).
    pub fn issue(&mut self, token: impl Into<String>) -> Result<PairingHandle> {
        if self.state == PairingState::Paired {
            return Err(Error::pairing_rejected("session is already paired"));
        }
        let token = token.into();
        self.token = Some(token.clone());
        self.deadline = Some(Instant::now() + self.ttl);
        self.state = PairingState::AwaitingScan;
        Ok(PairingHandle {
            token,
            expires_in_seconds: self.ttl.as_secs(),
        })
    }

    /// Confirm a scan. Rejects unknown tokens; a confirmation after the
    /// deadline moves the flow to `Expired` and the caller must retry with a
    /// fresh token.
    pub fn confirm(&mut self, token: &str) -> Result<()> {
        if self.state == PairingState::Expired {
            return Err(Error::PairingExpired);
        }
        if self.state != PairingState::AwaitingScan {
            return Err(Error::pairing_rejected(format!(
                "no pairing in progress (state: {:?})",
                self.state
            )));
        }
        if self.deadline.is_some_and(|d| Instant::now() > d) {
            self.state = PairingState::Expired;
            self.token = None;
            return Err(Error::PairingExpired);
        }
        if self.token.as_deref() != Some(token) {
            return Err(Error::pairing_rejected("token mismatch"));
        }
        self.state = PairingState::Paired;
        self.token = None;
        self.deadline = None;
        Ok(())
    }

    /// Move to `Expired` if the deadline has passed. Returns true when the
    /// transition happened.
    pub fn expire_if_due(&mut self) -> bool {
        if self.state == PairingState::AwaitingScan
            && self.deadline.is_some_and(|d| Instant::now() > d)
        {
            self.state = PairingState::Expired;
            self.token = None;
            self.deadline = None;
            return true;
        }
        false
    }

    /// Mark the flow paired without a token check. For transports that learn
    /// about the scan out of band (the session simply comes up
    /// authenticated).
    pub fn mark_paired(&mut self) {
        self.state = PairingState::Paired;
        self.token = None;
        self.deadline = None;
    }

    /// Mark the flow failed (fatal auth error from the transport).
    pub fn fail(&mut self) {
        self.state = PairingState::Failed;
        self.token = None;
        self.deadline = None;
    }

    /// Back to `Idle` after a disconnect, so a later connect re-pairs.
    pub fn reset(&mut self) {
        self.state = PairingState::Idle;
        self.token = None;
        self.deadline = None;
    }
}

impl Default for PairingFlow {
    fn default() -> Self {
        Self::new(DEFAULT_PAIRING_TTL)
    }
}
