//! Session timing and lockout settings.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minutes until an unlocked session locks itself; 0 never expires
    pub auto_lock_minutes: u32,

    /// Consecutive failures that trigger a lockout
    pub failed_attempts_lockout: u32,

    /// Length of the lockout window
    pub lockout_minutes: u32,

    /// Push `expires_at` forward on every key access
    pub extend_on_activity: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_lock_minutes: 15,
            failed_attempts_lockout: 5,
            lockout_minutes: 15,
            extend_on_activity: false,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.failed_attempts_lockout < 1 {
            return Err(VaultError::InvalidConfig(
                "failed_attempts_lockout must be at least 1".to_string(),
            ));
        }
        if self.lockout_minutes < 1 {
            return Err(VaultError::InvalidConfig(
                "lockout_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// `None` when sessions never expire.
    pub fn auto_lock(&self) -> Option<Duration> {
        (self.auto_lock_minutes > 0).then(|| Duration::minutes(i64::from(self.auto_lock_minutes)))
    }

    pub fn lockout(&self) -> Duration {
        Duration::minutes(i64::from(self.lockout_minutes))
    }
}
