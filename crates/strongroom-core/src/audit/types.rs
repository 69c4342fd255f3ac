//! Audit entry types, query filter and configuration.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// `prev_hash` of the first entry ever written.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// What was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Init,
    Unlock,
    Lock,
    PasswordChange,
    KeyRotation,
    Reset,
    Delete,
    TierChange,
    Migrate,
}

impl AuditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOperation::Init => "init",
            AuditOperation::Unlock => "unlock",
            AuditOperation::Lock => "lock",
            AuditOperation::PasswordChange => "password_change",
            AuditOperation::KeyRotation => "key_rotation",
            AuditOperation::Reset => "reset",
            AuditOperation::Delete => "delete",
            AuditOperation::TierChange => "tier_change",
            AuditOperation::Migrate => "migrate",
        }
    }
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditOperation {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let op = match normalized.as_str() {
            "init" => AuditOperation::Init,
            "unlock" => AuditOperation::Unlock,
            "lock" => AuditOperation::Lock,
            "password_change" => AuditOperation::PasswordChange,
            "key_rotation" | "rotate" => AuditOperation::KeyRotation,
            "reset" => AuditOperation::Reset,
            "delete" => AuditOperation::Delete,
            "tier_change" | "tier" => AuditOperation::TierChange,
            "migrate" => AuditOperation::Migrate,
            _ => {
                return Err(VaultError::InvalidInput(format!(
                    "Unknown audit operation: {}",
                    s
                )))
            }
        };
        Ok(op)
    }
}

/// How it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    /// Wrong password or a failed operation
    Failure,
    /// Refused without being evaluated (lockout, missing confirmation)
    Denied,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResult::Success => "success",
            AuditResult::Failure => "failure",
            AuditResult::Denied => "denied",
        }
    }
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditResult {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" | "ok" => Ok(AuditResult::Success),
            "failure" | "failed" => Ok(AuditResult::Failure),
            "denied" => Ok(AuditResult::Denied),
            _ => Err(VaultError::InvalidInput(format!(
                "Unknown audit result: {}",
                s
            ))),
        }
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 0
    pub seq: u64,

    pub timestamp: DateTime<Utc>,

    pub operation: AuditOperation,

    pub result: AuditResult,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    /// Operation-specific detail (never secrets)
    #[serde(default)]
    pub details: serde_json::Value,

    /// `hash` of the previous entry, or the chain anchor
    pub prev_hash: String,

    /// BLAKE3 over `prev_hash` and the entry body
    pub hash: String,
}

/// The hashed portion of an entry: everything except `hash`.
#[derive(Serialize)]
struct EntryBody<'a> {
    seq: u64,
    timestamp: &'a DateTime<Utc>,
    operation: AuditOperation,
    result: AuditResult,
    document_id: &'a Option<String>,
    details: &'a serde_json::Value,
}

impl AuditEntry {
    pub(crate) fn compute_hash(&self) -> crate::error::Result<String> {
        let body = serde_json::to_vec(&EntryBody {
            seq: self.seq,
            timestamp: &self.timestamp,
            operation: self.operation,
            result: self.result,
            document_id: &self.document_id,
            details: &self.details,
        })?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.prev_hash.as_bytes());
        hasher.update(&body);
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Query over the audit log; all criteria are ANDed.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub operation: Option<AuditOperation>,

    pub result: Option<AuditResult>,

    pub document_id: Option<String>,

    /// Start time (inclusive)
    pub since: Option<DateTime<Utc>>,

    /// End time (inclusive)
    pub until: Option<DateTime<Utc>>,

    /// Keep only the newest `limit` matches
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(mut self, operation: AuditOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn result(mut self, result: AuditResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn since(mut self, date: DateTime<Utc>) -> Self {
        self.since = Some(date);
        self
    }

    pub fn until(mut self, date: DateTime<Utc>) -> Self {
        self.until = Some(date);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn matches(&self, entry: &AuditEntry) -> bool {
        self.operation.map_or(true, |op| entry.operation == op)
            && self.result.map_or(true, |result| entry.result == result)
            && self
                .document_id
                .as_ref()
                .map_or(true, |id| entry.document_id.as_ref() == Some(id))
            && self.since.map_or(true, |since| entry.timestamp >= since)
            && self.until.map_or(true, |until| entry.timestamp <= until)
    }
}

/// Audit trail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,

    /// Rotation keeps at most this many entries
    pub max_entries: Option<usize>,

    /// Rotation drops entries older than this
    pub max_age_days: Option<u32>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: None,
            max_age_days: None,
        }
    }
}

impl AuditConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Outcome of walking the hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    Intact { entries: usize },
    Broken { seq: u64, reason: String },
}

impl ChainStatus {
    pub fn is_intact(&self) -> bool {
        matches!(self, ChainStatus::Intact { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse_accepts_cli_spellings() {
        assert_eq!(
            "password-change".parse::<AuditOperation>().unwrap(),
            AuditOperation::PasswordChange
        );
        assert_eq!(
            "rotate".parse::<AuditOperation>().unwrap(),
            AuditOperation::KeyRotation
        );
        assert!("nope".parse::<AuditOperation>().is_err());
    }

    #[test]
    fn test_entry_serializes_snake_case() {
        let entry = AuditEntry {
            seq: 0,
            timestamp: Utc::now(),
            operation: AuditOperation::KeyRotation,
            result: AuditResult::Denied,
            document_id: None,
            details: serde_json::Value::Null,
            prev_hash: GENESIS_HASH.to_string(),
            hash: String::new(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"key_rotation\""));
        assert!(json.contains("\"denied\""));
        assert!(!json.contains("document_id"));
    }

    #[test]
    fn test_hash_depends_on_prev_hash() {
        let mut entry = AuditEntry {
            seq: 3,
            timestamp: Utc::now(),
            operation: AuditOperation::Delete,
            result: AuditResult::Success,
            document_id: Some("doc".to_string()),
            details: serde_json::json!({"chunks_removed": 2}),
            prev_hash: GENESIS_HASH.to_string(),
            hash: String::new(),
        };
        let first = entry.compute_hash().unwrap();
        entry.prev_hash = "f".repeat(64);
        assert_ne!(first, entry.compute_hash().unwrap());
    }
}
