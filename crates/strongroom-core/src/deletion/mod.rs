//! Standard, secure and cryptographic deletion.
//!
//! - `Standard` removes the rows.
//! - `Secure` also scrubs them in place (`OverwriteHook`) with SQLite's
//!   `secure_delete` on. Against an encrypted store the scrubbed bytes were
//!   ciphertext to begin with, so this is no stronger than `Standard` there;
//!   it matters for plaintext stores.
//! - `Cryptographic` confirms the password, removes the rows, then rotates
//!   the key and re-encrypts what is left. Copies of the database taken
//!   before the deletion cannot be opened with anything the vault can still
//!   derive.
//!
//! Each deleted document gets one audit record. A failed audit write is
//! logged and does not undo or block the deletion.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditOperation, AuditResult};
use crate::error::{Result, VaultError};
use crate::session::SessionManager;
use crate::storage::{DocumentStore, EncryptedStore, OverwriteHook, ZeroFill};
use crate::tiers::TierManager;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionLevel {
    #[default]
    Standard,
    Secure,
    Cryptographic,
}

impl DeletionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionLevel::Standard => "standard",
            DeletionLevel::Secure => "secure",
            DeletionLevel::Cryptographic => "cryptographic",
        }
    }

    pub fn rotates_key(&self) -> bool {
        matches!(self, DeletionLevel::Cryptographic)
    }
}

impl fmt::Display for DeletionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletionLevel {
    type Err = VaultError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(DeletionLevel::Standard),
            "secure" => Ok(DeletionLevel::Secure),
            "cryptographic" | "crypto" | "purge" => Ok(DeletionLevel::Cryptographic),
            _ => Err(VaultError::InvalidInput(format!(
                "Unknown deletion level: {}",
                s
            ))),
        }
    }
}

/// What happened to one document. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRecord {
    pub document_id: String,
    pub level: DeletionLevel,
    /// 0 for an id the store did not know
    pub chunks_removed: usize,
    pub key_rotated: bool,
    pub timestamp: DateTime<Utc>,
}

/// Runs deletions against a vault's store.
pub struct SecureDeleter<'a> {
    session: &'a SessionManager,
    overwrite: Box<dyn OverwriteHook + 'a>,
}

impl<'a> SecureDeleter<'a> {
    /// Deleter using [`ZeroFill`] for secure deletes.
    pub fn new(session: &'a SessionManager) -> Self {
        Self {
            session,
            overwrite: Box::new(ZeroFill),
        }
    }

    pub fn with_overwrite_hook(mut self, hook: impl OverwriteHook + 'a) -> Self {
        self.overwrite = Box::new(hook);
        self
    }

    /// Delete `document_ids` from `store` at `level`.
    ///
    /// `password` is required for `Cryptographic` and ignored otherwise.
    /// A cryptographic batch rotates the key exactly once, after every row
    /// is gone; `store` is left open under the new key.
    pub fn delete(
        &self,
        store: &mut EncryptedStore,
        document_ids: &[&str],
        level: DeletionLevel,
        password: Option<&str>,
    ) -> Result<Vec<DeletionRecord>> {
        if document_ids.is_empty() {
            return Err(VaultError::InvalidInput(
                "No documents given to delete".to_string(),
            ));
        }
        if document_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(VaultError::InvalidInput(
                "Document id cannot be empty".to_string(),
            ));
        }

        let confirmed = match (level, password) {
            (DeletionLevel::Cryptographic, Some(password)) => Some((
                password,
                self.session.confirm_for(password, AuditOperation::Delete)?,
            )),
            (DeletionLevel::Cryptographic, None) => {
                return Err(VaultError::ConfirmationRequired(
                    "cryptographic deletion needs the vault password".to_string(),
                ))
            }
            _ => None,
        };

        let hook = match level {
            DeletionLevel::Secure => Some(self.overwrite.as_ref()),
            _ => None,
        };

        let mut removed = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            match store.delete_document(id, hook) {
                Ok(chunks) => {
                    if chunks == 0 {
                        tracing::debug!(document_id = %id, "No chunks stored for document");
                    }
                    removed.push((id.to_string(), chunks));
                }
                Err(err) => {
                    // Earlier documents are already gone in their own
                    // transactions; they still get their records.
                    let records = self.records(removed, level, false);
                    self.audit(&records, AuditResult::Success);
                    self.audit_failed(id, level, &err);
                    let gone: Vec<&str> = records.iter().map(|r| r.document_id.as_str()).collect();
                    self.forget_tiers(&gone);
                    tracing::warn!(
                        deleted = records.len(),
                        failed = %id,
                        "Deletion batch stopped: {}",
                        err
                    );
                    return Err(err);
                }
            }
        }

        let rotation = match &confirmed {
            Some((password, current)) => self
                .session
                .rotate_with(current, password, Some(&mut *store))
                .map(|()| true),
            None => Ok(false),
        };
        let key_rotated = *rotation.as_ref().unwrap_or(&false);

        let records = self.records(removed, level, key_rotated);

        let result = if rotation.is_ok() {
            AuditResult::Success
        } else {
            AuditResult::Failure
        };
        self.audit(&records, result);
        self.forget_tiers(document_ids);

        rotation?;
        tracing::info!(
            documents = records.len(),
            level = %level,
            key_rotated,
            "Documents deleted"
        );
        Ok(records)
    }

    fn records(
        &self,
        removed: Vec<(String, usize)>,
        level: DeletionLevel,
        key_rotated: bool,
    ) -> Vec<DeletionRecord> {
        let now = self.session.clock().now();
        removed
            .into_iter()
            .map(|(document_id, chunks_removed)| DeletionRecord {
                document_id,
                level,
                chunks_removed,
                key_rotated,
                timestamp: now,
            })
            .collect()
    }

    fn audit_failed(&self, document_id: &str, level: DeletionLevel, err: &VaultError) {
        let Some(audit) = self.session.audit_log() else {
            return;
        };
        let details = serde_json::json!({ "level": level, "error": err.to_string() });
        if let Err(audit_err) =
            audit.append(AuditOperation::Delete, AuditResult::Failure, Some(document_id), details)
        {
            tracing::warn!(document_id, "Audit write failed: {}", audit_err);
        }
    }

    fn audit(&self, records: &[DeletionRecord], result: AuditResult) {
        let Some(audit) = self.session.audit_log() else {
            return;
        };
        for record in records {
            if let Err(err) = audit.append_record(
                AuditOperation::Delete,
                result,
                Some(record.document_id.as_str()),
                record,
            ) {
                tracing::warn!(document_id = %record.document_id, "Audit write failed: {}", err);
            }
        }
    }

    fn forget_tiers(&self, document_ids: &[&str]) {
        let tiers = TierManager::for_session(self.session);
        if let Err(err) = tiers.remove_documents(document_ids) {
            tracing::warn!("Failed to drop tier assignments of deleted documents: {}", err);
        }
    }
}

impl fmt::Debug for SecureDeleter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureDeleter")
            .field("session", self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditConfig, AuditFilter, AuditLog};
    use crate::crypto::kdf::tests::fast_config;
    use crate::keystore::KeyStore;
    use crate::layout::VaultPaths;
    use crate::session::SessionConfig;
    use crate::storage::{NewChunk, NewDocument};
    use crate::tiers::DataTier;
    use std::path::Path;
    use tempfile::tempdir;

    const PASSWORD: &str = "correct-horse";

    fn unlocked_session(dir: &Path) -> SessionManager {
        let paths = VaultPaths::new(dir);
        let audit = AuditLog::new(paths.audit(), AuditConfig::default());
        let session = SessionManager::open(paths, SessionConfig::default())
            .unwrap()
            .with_crypto_config(fast_config())
            .with_key_store(KeyStore::unprotected())
            .with_audit(audit);
        session.init(PASSWORD).unwrap();
        session.unlock(PASSWORD).unwrap();
        session
    }

    fn seeded_store(session: &SessionManager) -> EncryptedStore {
        let mut store = session.open_store().unwrap();
        for id in ["doc-a", "doc-b"] {
            store
                .insert_document(
                    &NewDocument::new(id, format!("/{}", id))
                        .with_chunk(NewChunk::new("one"))
                        .with_chunk(NewChunk::new("two")),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(
            "purge".parse::<DeletionLevel>().unwrap(),
            DeletionLevel::Cryptographic
        );
        assert!("shred".parse::<DeletionLevel>().is_err());
    }

    #[test]
    fn test_standard_delete_records_each_document() {
        let dir = tempdir().unwrap();
        let session = unlocked_session(dir.path());
        let mut store = seeded_store(&session);
        let deleter = SecureDeleter::new(&session);

        let records = deleter
            .delete(&mut store, &["doc-a", "unknown"], DeletionLevel::Standard, None)
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].chunks_removed, 2);
        assert_eq!(records[1].chunks_removed, 0);
        assert!(!records[0].key_rotated);
        assert_eq!(store.document_ids().unwrap(), vec!["doc-b".to_string()]);

        let audit = session.audit_log().unwrap();
        let deletes = audit
            .query(&AuditFilter::new().operation(AuditOperation::Delete))
            .unwrap();
        assert_eq!(deletes.len(), 2);
        assert_eq!(deletes[1].document_id.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_secure_delete_uses_hook() {
        let dir = tempdir().unwrap();
        let session = unlocked_session(dir.path());
        let mut store = seeded_store(&session);

        let records = SecureDeleter::new(&session)
            .delete(&mut store, &["doc-b"], DeletionLevel::Secure, None)
            .unwrap();
        assert_eq!(records[0].level, DeletionLevel::Secure);
        assert_eq!(store.chunk_count("doc-b").unwrap(), 0);
    }

    #[test]
    fn test_cryptographic_requires_password() {
        let dir = tempdir().unwrap();
        let session = unlocked_session(dir.path());
        let mut store = seeded_store(&session);
        let deleter = SecureDeleter::new(&session);

        assert!(matches!(
            deleter.delete(&mut store, &["doc-a"], DeletionLevel::Cryptographic, None),
            Err(VaultError::ConfirmationRequired(_))
        ));
        assert!(deleter
            .delete(
                &mut store,
                &["doc-a"],
                DeletionLevel::Cryptographic,
                Some("wrong-password")
            )
            .unwrap_err()
            .is_auth_failure());
        assert_eq!(store.chunk_count("doc-a").unwrap(), 2);
    }

    #[test]
    fn test_cryptographic_delete_rotates_key() {
        let dir = tempdir().unwrap();
        let session = unlocked_session(dir.path());
        let mut store = seeded_store(&session);
        let old_key = session.key().unwrap();

        let records = SecureDeleter::new(&session)
            .delete(
                &mut store,
                &["doc-a"],
                DeletionLevel::Cryptographic,
                Some(PASSWORD),
            )
            .unwrap();

        assert!(records[0].key_rotated);
        assert_eq!(store.document_ids().unwrap(), vec!["doc-b".to_string()]);
        drop(store);

        assert!(matches!(
            EncryptedStore::open(&session.paths().database(), &old_key),
            Err(VaultError::DatabaseLocked)
        ));
        let reopened = session.open_store().unwrap();
        assert_eq!(reopened.chunk_count("doc-b").unwrap(), 2);
    }

    #[test]
    fn test_deleted_documents_leave_tier_map() {
        let dir = tempdir().unwrap();
        let session = unlocked_session(dir.path());
        let mut store = seeded_store(&session);
        let tiers = TierManager::for_session(&session);
        tiers.set_tier("doc-a", DataTier::Critical).unwrap();

        SecureDeleter::new(&session)
            .delete(&mut store, &["doc-a"], DeletionLevel::Standard, None)
            .unwrap();
        assert!(tiers.list_documents(None).unwrap().is_empty());
    }

    /// Refuses to scrub one particular document.
    struct FailingHook(&'static str);

    impl OverwriteHook for FailingHook {
        fn overwrite(&self, tx: &rusqlite::Transaction<'_>, document_id: &str) -> Result<usize> {
            if document_id == self.0 {
                return Err(VaultError::Storage("disk".to_string()));
            }
            ZeroFill.overwrite(tx, document_id)
        }
    }

    #[test]
    fn test_failed_batch_still_records_deleted_documents() {
        let dir = tempdir().unwrap();
        let session = unlocked_session(dir.path());
        let mut store = seeded_store(&session);
        let tiers = TierManager::for_session(&session);
        tiers.set_tier("doc-a", DataTier::Sensitive).unwrap();
        tiers.set_tier("doc-b", DataTier::Sensitive).unwrap();

        let result = SecureDeleter::new(&session)
            .with_overwrite_hook(FailingHook("doc-b"))
            .delete(&mut store, &["doc-a", "doc-b"], DeletionLevel::Secure, None);
        assert!(matches!(result, Err(VaultError::Storage(_))));
        assert_eq!(store.document_ids().unwrap(), vec!["doc-b".to_string()]);

        let deletes = session
            .audit_log()
            .unwrap()
            .query(&AuditFilter::new().operation(AuditOperation::Delete))
            .unwrap();
        assert_eq!(deletes.len(), 2);
        assert_eq!(deletes[0].document_id.as_deref(), Some("doc-a"));
        assert_eq!(deletes[0].result, AuditResult::Success);
        assert_eq!(deletes[1].document_id.as_deref(), Some("doc-b"));
        assert_eq!(deletes[1].result, AuditResult::Failure);

        let remaining = tiers.list_documents(None).unwrap();
        assert_eq!(remaining, vec![("doc-b".to_string(), DataTier::Sensitive)]);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let dir = tempdir().unwrap();
        let session = unlocked_session(dir.path());
        let mut store = seeded_store(&session);
        assert!(matches!(
            SecureDeleter::new(&session).delete(&mut store, &[], DeletionLevel::Standard, None),
            Err(VaultError::InvalidInput(_))
        ));
    }
}
