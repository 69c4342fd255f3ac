//! Per-document sensitivity tiers.
//!
//! Access is decided per tier, not cumulatively: `Public` is always
//! readable, `Personal` whenever the store itself can be opened, and
//! `Sensitive`/`Critical` only while a session is unlocked. Without a
//! session manager the upper two tiers are never accessible.

mod tier;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditOperation, AuditResult};
use crate::error::{Result, VaultError};
use crate::fs::{sibling_path, write_atomic};
use crate::lock::FileLock;
use crate::session::SessionManager;

pub use tier::DataTier;

const TIER_FILE_VERSION: u32 = 1;

/// On-disk tier map. Documents absent from it are `Personal`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TierFile {
    #[serde(default = "tier_file_version")]
    version: u32,
    #[serde(default)]
    tiers: BTreeMap<String, DataTier>,
}

fn tier_file_version() -> u32 {
    TIER_FILE_VERSION
}

impl TierFile {
    fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    version: TIER_FILE_VERSION,
                    tiers: BTreeMap::new(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        let file: TierFile = serde_json::from_str(&contents)?;
        if file.version != TIER_FILE_VERSION {
            return Err(VaultError::Storage(format!(
                "Unsupported tier file version {}",
                file.version
            )));
        }
        Ok(file)
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &serde_json::to_vec_pretty(self)?)
    }

    fn tier_of(&self, document_id: &str) -> DataTier {
        self.tiers.get(document_id).copied().unwrap_or_default()
    }
}

fn check_id(document_id: &str) -> Result<()> {
    if document_id.trim().is_empty() {
        return Err(VaultError::InvalidInput(
            "Document id cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Reads and changes document tiers, gated on the session.
pub struct TierManager<'a> {
    path: PathBuf,
    session: Option<&'a SessionManager>,
}

impl<'a> TierManager<'a> {
    /// Tier map at `path`; `session` may be absent, in which case the
    /// upper tiers are inaccessible.
    pub fn new(path: impl Into<PathBuf>, session: Option<&'a SessionManager>) -> Self {
        Self {
            path: path.into(),
            session,
        }
    }

    /// Tier map of the vault `session` manages.
    pub fn for_session(session: &'a SessionManager) -> Self {
        Self::new(session.paths().tiers(), Some(session))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<FileLock> {
        FileLock::exclusive(&sibling_path(&self.path, ".lock"))
    }

    fn load(&self) -> Result<TierFile> {
        TierFile::load(&self.path)
    }

    fn record_change(&self, document_id: &str, from: DataTier, to: DataTier) {
        if let Some(audit) = self.session.and_then(SessionManager::audit_log) {
            if let Err(err) = audit.append(
                AuditOperation::TierChange,
                AuditResult::Success,
                Some(document_id),
                json!({ "from": from, "to": to }),
            ) {
                tracing::warn!(document_id, "Audit write failed: {}", err);
            }
        }
    }

    fn session_active(&self) -> bool {
        self.session.map_or(false, SessionManager::is_active)
    }

    /// Whether documents of `tier` may be read right now.
    pub fn can_access(&self, tier: DataTier) -> bool {
        match tier {
            DataTier::Public | DataTier::Personal => true,
            DataTier::Sensitive | DataTier::Critical => self.session_active(),
        }
    }

    /// Highest tier such that it and everything below it is accessible.
    pub fn accessible_ceiling(&self) -> DataTier {
        if self.session_active() {
            DataTier::Critical
        } else {
            DataTier::Personal
        }
    }

    /// Tier of `document_id`; `Personal` if never set.
    pub fn get_tier(&self, document_id: &str) -> Result<DataTier> {
        check_id(document_id)?;
        Ok(self.load()?.tier_of(document_id))
    }

    /// Apply `change` to each document under the tier lock. Every current
    /// tier must be accessible or nothing is written.
    fn update<F>(&self, document_ids: &[&str], change: F) -> Result<Vec<(String, DataTier, DataTier)>>
    where
        F: Fn(DataTier) -> Option<DataTier>,
    {
        for id in document_ids {
            check_id(id)?;
        }
        let _guard = self.lock()?;
        let mut file = self.load()?;

        let mut changes = Vec::new();
        for id in document_ids {
            let current = file.tier_of(id);
            if !self.can_access(current) {
                return Err(VaultError::SessionLocked);
            }
            if let Some(next) = change(current) {
                changes.push((id.to_string(), current, next));
            }
        }

        if changes.is_empty() {
            return Ok(changes);
        }
        for (id, _, next) in &changes {
            file.tiers.insert(id.clone(), *next);
        }
        file.save(&self.path)?;

        for (id, from, to) in &changes {
            tracing::debug!(document_id = %id, from = %from, to = %to, "Tier changed");
            self.record_change(id, *from, *to);
        }
        Ok(changes)
    }

    /// Set the tier of one document; returns the previous tier.
    ///
    /// Fails with `SessionLocked` if the document's current tier is not
    /// accessible.
    pub fn set_tier(&self, document_id: &str, tier: DataTier) -> Result<DataTier> {
        let changes = self.update(&[document_id], |current| (current != tier).then_some(tier))?;
        Ok(changes.first().map_or(tier, |(_, from, _)| *from))
    }

    /// Set many documents at once, all or nothing. Returns how many changed.
    pub fn bulk_set_tier(&self, document_ids: &[&str], tier: DataTier) -> Result<usize> {
        let changes = self.update(document_ids, |current| (current != tier).then_some(tier))?;
        Ok(changes.len())
    }

    /// One step up; `None` (and no change) at `Critical`.
    pub fn promote_tier(&self, document_id: &str) -> Result<Option<DataTier>> {
        let changes = self.update(&[document_id], DataTier::promoted)?;
        Ok(changes.first().map(|(_, _, to)| *to))
    }

    /// One step down; `None` (and no change) at `Public`.
    pub fn demote_tier(&self, document_id: &str) -> Result<Option<DataTier>> {
        let changes = self.update(&[document_id], DataTier::demoted)?;
        Ok(changes.first().map(|(_, _, to)| *to))
    }

    /// Documents at or below `max_tier` that are accessible right now,
    /// in input order.
    pub fn filter_by_tier(&self, document_ids: &[&str], max_tier: DataTier) -> Result<Vec<String>> {
        let file = self.load()?;
        let session_active = self.session_active();
        Ok(document_ids
            .iter()
            .filter(|id| {
                let tier = file.tier_of(id);
                tier <= max_tier && (!tier.requires_session() || session_active)
            })
            .map(|id| id.to_string())
            .collect())
    }

    /// Documents with an explicitly assigned tier, optionally only one tier.
    pub fn list_documents(&self, tier: Option<DataTier>) -> Result<Vec<(String, DataTier)>> {
        Ok(self
            .load()?
            .tiers
            .into_iter()
            .filter(|(_, assigned)| tier.map_or(true, |wanted| *assigned == wanted))
            .collect())
    }

    /// Count of explicitly assigned documents per tier (all tiers present).
    pub fn tier_counts(&self) -> Result<BTreeMap<DataTier, usize>> {
        let mut counts: BTreeMap<DataTier, usize> =
            DataTier::ALL.into_iter().map(|tier| (tier, 0)).collect();
        for tier in self.load()?.tiers.values() {
            *counts.entry(*tier).or_default() += 1;
        }
        Ok(counts)
    }

    /// Forget the tiers of deleted documents. Returns how many were known.
    pub fn remove_documents(&self, document_ids: &[&str]) -> Result<usize> {
        let _guard = self.lock()?;
        let mut file = self.load()?;
        let removed = document_ids
            .iter()
            .filter(|id| file.tiers.remove(**id).is_some())
            .count();
        if removed > 0 {
            file.save(&self.path)?;
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for TierManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierManager")
            .field("path", &self.path)
            .field("session", &self.session.is_some())
            .finish()
    }
}
