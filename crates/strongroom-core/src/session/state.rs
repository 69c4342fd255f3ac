//! Session state as seen by callers and as persisted between processes.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fs::write_atomic;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No verification record exists yet
    Uninitialized,
    Locked,
    Unlocked {
        unlocked_at: DateTime<Utc>,
        /// `None` when auto-lock is disabled
        expires_at: Option<DateTime<Utc>>,
    },
}

impl SessionState {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, SessionState::Unlocked { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Locked => "locked",
            SessionState::Unlocked { .. } => "unlocked",
        }
    }
}

/// Snapshot returned by `SessionManager::status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    #[serde(flatten)]
    pub state: SessionState,

    pub failed_attempts: u32,

    /// Failures left before lockout
    pub attempts_remaining: u32,

    /// Set while a lockout is in force
    pub locked_out_until: Option<DateTime<Utc>>,

    /// Seconds until auto-lock, if unlocked with an expiry
    pub expires_in_seconds: Option<i64>,

    /// Whether this process holds the key
    pub key_loaded: bool,

    /// Whether the held key is pinned in RAM
    pub key_protected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StateTag {
    Uninitialized,
    Locked,
    Unlocked,
}

/// Flat on-disk form: `{state, failed_attempts, locked_out_until,
/// unlocked_at, expires_at}`. Never contains key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SessionFile {
    pub state: StateTag,
    #[serde(default)]
    pub failed_attempts: u32,
    #[serde(default)]
    pub locked_out_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Default for SessionFile {
    fn default() -> Self {
        Self {
            state: StateTag::Locked,
            failed_attempts: 0,
            locked_out_until: None,
            unlocked_at: None,
            expires_at: None,
        }
    }
}

impl SessionFile {
    /// Missing file reads as a fresh locked session.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    pub fn state(&self) -> SessionState {
        match (self.state, self.unlocked_at) {
            (StateTag::Uninitialized, _) => SessionState::Uninitialized,
            (StateTag::Unlocked, Some(unlocked_at)) => SessionState::Unlocked {
                unlocked_at,
                expires_at: self.expires_at,
            },
            _ => SessionState::Locked,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state().is_unlocked()
    }

    /// Lock if the unlock window has passed. Returns true if it just expired.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) if self.state == StateTag::Unlocked && now >= expires_at => {
                self.mark_locked();
                true
            }
            _ => false,
        }
    }

    pub fn mark_unlocked(&mut self, now: DateTime<Utc>, auto_lock: Option<Duration>) {
        self.state = StateTag::Unlocked;
        self.unlocked_at = Some(now);
        self.expires_at = auto_lock.map(|window| now + window);
    }

    pub fn mark_locked(&mut self) {
        self.state = StateTag::Locked;
        self.unlocked_at = None;
        self.expires_at = None;
    }

    /// Restart the auto-lock window from `now`.
    pub fn extend(&mut self, now: DateTime<Utc>, auto_lock: Option<Duration>) {
        self.expires_at = auto_lock.map(|window| now + window);
    }

    /// `(until, remaining_seconds)` while a lockout is in force.
    pub fn active_lockout(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, i64)> {
        self.locked_out_until
            .filter(|until| now < *until)
            .map(|until| (until, (until - now).num_seconds().max(1)))
    }

    /// Forget a lockout whose window has elapsed, along with its failures.
    pub fn clear_elapsed_lockout(&mut self, now: DateTime<Utc>) {
        if matches!(self.locked_out_until, Some(until) if now >= until) {
            self.locked_out_until = None;
            self.failed_attempts = 0;
        }
    }
}
