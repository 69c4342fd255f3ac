use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Sensitivity of a document, lowest first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DataTier {
    /// Readable without any session
    Public = 0,
    /// Readable whenever the store is reachable
    #[default]
    Personal = 1,
    /// Needs an unlocked session
    Sensitive = 2,
    /// Needs an unlocked session
    Critical = 3,
}

impl DataTier {
    pub const ALL: [DataTier; 4] = [
        DataTier::Public,
        DataTier::Personal,
        DataTier::Sensitive,
        DataTier::Critical,
    ];

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> Option<Self> {
        Self::ALL.get(usize::from(level)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            DataTier::Public => "public",
            DataTier::Personal => "personal",
            DataTier::Sensitive => "sensitive",
            DataTier::Critical => "critical",
        }
    }

    /// One step up, or `None` at the ceiling.
    pub fn promoted(self) -> Option<Self> {
        Self::from_level(self.level() + 1)
    }

    /// One step down, or `None` at the floor.
    pub fn demoted(self) -> Option<Self> {
        self.level().checked_sub(1).and_then(Self::from_level)
    }

    pub fn requires_session(self) -> bool {
        self >= DataTier::Sensitive
    }
}

impl fmt::Display for DataTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataTier {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if let Ok(level) = normalized.parse::<u8>() {
            return Self::from_level(level)
                .ok_or_else(|| VaultError::InvalidInput(format!("Tier level out of range: {}", s)));
        }
        Self::ALL
            .into_iter()
            .find(|tier| tier.name() == normalized)
            .ok_or_else(|| {
                VaultError::InvalidInput(format!(
                    "Unknown tier '{}' (expected public, personal, sensitive, critical or 0-3)",
                    s
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(DataTier::Public < DataTier::Personal);
        assert!(DataTier::Personal < DataTier::Sensitive);
        assert!(DataTier::Sensitive < DataTier::Critical);
        assert_eq!(DataTier::default(), DataTier::Personal);
    }

    #[test]
    fn test_promote_demote_saturate() {
        assert_eq!(DataTier::Personal.promoted(), Some(DataTier::Sensitive));
        assert_eq!(DataTier::Critical.promoted(), None);
        assert_eq!(DataTier::Personal.demoted(), Some(DataTier::Public));
        assert_eq!(DataTier::Public.demoted(), None);
    }

    #[test]
    fn test_parse_names_and_levels() {
        assert_eq!("Critical".parse::<DataTier>().unwrap(), DataTier::Critical);
        assert_eq!("2".parse::<DataTier>().unwrap(), DataTier::Sensitive);
        assert!("4".parse::<DataTier>().is_err());
        assert!("secret".parse::<DataTier>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&DataTier::Sensitive).unwrap(),
            "\"sensitive\""
        );
    }
}
