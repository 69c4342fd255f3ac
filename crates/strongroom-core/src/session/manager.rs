use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::json;

use super::config::SessionConfig;
use super::state::{SessionFile, SessionState, SessionStatus};
use crate::audit::{AuditLog, AuditOperation, AuditResult};
use crate::clock::{Clock, SystemClock};
use crate::crypto::{derive_key, validate_passphrase, CryptoConfig, KeyMaterial, VerificationStore};
use crate::error::{Result, VaultError};
use crate::fs::remove_if_exists;
use crate::keystore::{KeyMetadata, KeyStore};
use crate::layout::VaultPaths;
use crate::lock::FileLock;
use crate::storage::{EncryptedStore, MigrationReport};

/// Owns the vault's key store and its persisted session state.
///
/// Construct one per process and pass it to whatever needs the key; there
/// is no global session.
pub struct SessionManager {
    paths: VaultPaths,
    config: SessionConfig,
    crypto: CryptoConfig,
    clock: Arc<dyn Clock>,
    keys: Mutex<KeyStore>,
    audit: Option<AuditLog>,
}

impl SessionManager {
    pub fn open(paths: VaultPaths, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            paths,
            config,
            crypto: CryptoConfig::default(),
            clock: Arc::new(SystemClock),
            keys: Mutex::new(KeyStore::new()),
            audit: None,
        })
    }

    /// KDF parameters for keys created from now on. Existing keys keep the
    /// parameters stored in their verification record.
    pub fn with_crypto_config(mut self, crypto: CryptoConfig) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_key_store(mut self, keys: KeyStore) -> Self {
        self.keys = Mutex::new(keys);
        self
    }

    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn audit_log(&self) -> Option<&AuditLog> {
        self.audit.as_ref()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn keys(&self) -> MutexGuard<'_, KeyStore> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, operation: AuditOperation, result: AuditResult, details: serde_json::Value) {
        if let Some(audit) = &self.audit {
            if let Err(err) = audit.append(operation, result, None, details) {
                tracing::warn!(operation = %operation, "Audit write failed: {}", err);
            }
        }
    }

    fn verification(&self) -> Result<VerificationStore> {
        VerificationStore::load(&self.paths.verification())?.ok_or(VaultError::NotInitialized)
    }

    /// Read-modify-write the persisted state under the session lock.
    ///
    /// Expiry is applied before `f` runs, the file is rewritten only if it
    /// changed, and the in-process key is dropped whenever the resulting
    /// state is not unlocked.
    fn transact<T>(&self, f: impl FnOnce(&mut SessionFile, DateTime<Utc>) -> Result<T>) -> Result<T> {
        let _guard = FileLock::exclusive(&self.paths.session_lock())?;
        let path = self.paths.session();
        let mut file = SessionFile::load(&path)?;
        let before = file.clone();
        let now = self.clock.now();

        if file.expire_if_due(now) {
            tracing::info!("Session expired; locked");
            self.record(
                AuditOperation::Lock,
                AuditResult::Success,
                json!({ "reason": "auto_lock" }),
            );
        }

        let outcome = f(&mut file, now);
        if file != before {
            file.save(&path)?;
        }
        if !file.is_unlocked() {
            self.keys().clear();
        }
        outcome
    }

    /// Check `password` with full lockout accounting, then hand the derived
    /// key to `on_success` while the session lock is still held.
    fn attempt<T>(
        &self,
        password: &str,
        operation: AuditOperation,
        on_success: impl FnOnce(&mut SessionFile, DateTime<Utc>, KeyMaterial) -> Result<T>,
    ) -> Result<T> {
        let verification = self.verification()?;
        let threshold = self.config.failed_attempts_lockout;
        let lockout = self.config.lockout();

        let outcome = self.transact(|file, now| {
            file.clear_elapsed_lockout(now);
            if let Some((until, remaining_seconds)) = file.active_lockout(now) {
                return Err(VaultError::Lockout {
                    until,
                    remaining_seconds,
                });
            }

            let candidate = derive_key(password, verification.salt(), verification.kdf())?;
            if !verification.verify(&candidate) {
                file.failed_attempts = file.failed_attempts.saturating_add(1);
                if file.failed_attempts >= threshold {
                    file.locked_out_until = Some(now + lockout);
                    file.mark_locked();
                    tracing::warn!(
                        failures = file.failed_attempts,
                        "Too many failed attempts; lockout engaged"
                    );
                }
                return Err(VaultError::Authentication {
                    attempts_remaining: threshold.saturating_sub(file.failed_attempts),
                });
            }

            file.failed_attempts = 0;
            on_success(file, now, candidate)
        });

        match &outcome {
            Err(VaultError::Authentication { attempts_remaining }) => self.record(
                operation,
                AuditResult::Failure,
                json!({ "attempts_remaining": attempts_remaining }),
            ),
            Err(VaultError::Lockout { until, .. }) => self.record(
                operation,
                AuditResult::Denied,
                json!({ "locked_out_until": until }),
            ),
            _ => {}
        }
        outcome
    }

    pub fn is_initialized(&self) -> bool {
        self.paths.verification().exists()
    }

    /// Create the verification record for `password`. The vault starts
    /// locked; the database is created on first [`open_store`](Self::open_store).
    pub fn init(&self, password: &str) -> Result<()> {
        if self.is_initialized() || EncryptedStore::exists(&self.paths.database()) {
            return Err(VaultError::AlreadyInitialized);
        }
        validate_passphrase(password)?;
        self.crypto.validate()?;
        std::fs::create_dir_all(self.paths.root())?;

        self.transact(|file, _| {
            if self.is_initialized() {
                return Err(VaultError::AlreadyInitialized);
            }
            let (verification, _key) = VerificationStore::create(password, &self.crypto)?;
            verification.save(&self.paths.verification())?;
            *file = SessionFile::default();
            Ok(())
        })?;

        self.record(
            AuditOperation::Init,
            AuditResult::Success,
            json!({ "kdf": self.crypto }),
        );
        tracing::info!(root = %self.paths.root().display(), "Vault initialized");
        Ok(())
    }

    /// Verify `password`, load the key and start the auto-lock window.
    ///
    /// Unlocking an unlocked session re-derives the key and restarts the
    /// window.
    pub fn unlock(&self, password: &str) -> Result<SessionStatus> {
        let auto_lock = self.config.auto_lock();
        self.attempt(password, AuditOperation::Unlock, |file, now, key| {
            file.mark_unlocked(now, auto_lock);
            self.keys().store_key(key);
            Ok(())
        })?;

        self.record(AuditOperation::Unlock, AuditResult::Success, json!({}));
        tracing::info!("Session unlocked");
        self.status()
    }

    /// Load the key into this process for a session another process
    /// unlocked, without restarting the window.
    pub fn resume(&self, password: &str) -> Result<()> {
        if !self.is_active() {
            return Err(VaultError::SessionLocked);
        }
        let extend = self.config.extend_on_activity;
        let auto_lock = self.config.auto_lock();
        self.attempt(password, AuditOperation::Unlock, |file, now, key| {
            if !file.is_unlocked() {
                return Err(VaultError::SessionLocked);
            }
            if extend {
                file.extend(now, auto_lock);
            }
            self.keys().store_key(key);
            Ok(())
        })?;
        tracing::debug!("Key loaded for active session");
        Ok(())
    }

    pub fn lock(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(VaultError::NotInitialized);
        }
        let was_unlocked = self.transact(|file, _| {
            let was_unlocked = file.is_unlocked();
            file.mark_locked();
            Ok(was_unlocked)
        })?;
        self.keys().clear();

        self.record(
            AuditOperation::Lock,
            AuditResult::Success,
            json!({ "was_unlocked": was_unlocked }),
        );
        tracing::info!("Session locked");
        Ok(())
    }

    /// Restart the auto-lock window. Returns the new expiry.
    pub fn extend(&self) -> Result<Option<DateTime<Utc>>> {
        let auto_lock = self.config.auto_lock();
        self.transact(|file, now| {
            if !file.is_unlocked() {
                return Err(VaultError::SessionLocked);
            }
            file.extend(now, auto_lock);
            Ok(file.expires_at)
        })
    }

    /// Record activity; extends the window only if configured to.
    pub fn touch(&self) -> Result<()> {
        if !self.config.extend_on_activity || !self.is_initialized() {
            return Ok(());
        }
        let auto_lock = self.config.auto_lock();
        self.transact(|file, now| {
            if file.is_unlocked() {
                file.extend(now, auto_lock);
            }
            Ok(())
        })
    }

    /// True while the persisted session is unlocked and unexpired.
    ///
    /// Unreadable state counts as locked.
    pub fn is_active(&self) -> bool {
        if !self.is_initialized() {
            return false;
        }
        match self.transact(|file, _| Ok(file.is_unlocked())) {
            Ok(active) => active,
            Err(err) => {
                tracing::warn!("Session state unreadable; treating as locked: {}", err);
                false
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        !self.is_active()
    }

    pub fn status(&self) -> Result<SessionStatus> {
        let threshold = self.config.failed_attempts_lockout;
        if !self.is_initialized() {
            return Ok(SessionStatus {
                state: SessionState::Uninitialized,
                failed_attempts: 0,
                attempts_remaining: threshold,
                locked_out_until: None,
                expires_in_seconds: None,
                key_loaded: false,
                key_protected: false,
            });
        }

        let (file, now) = self.transact(|file, now| {
            file.clear_elapsed_lockout(now);
            Ok((file.clone(), now))
        })?;
        let state = file.state();
        let expires_in_seconds = match state {
            SessionState::Unlocked {
                expires_at: Some(expires_at),
                ..
            } => Some((expires_at - now).num_seconds().max(0)),
            _ => None,
        };
        let keys = self.keys();

        Ok(SessionStatus {
            state,
            failed_attempts: file.failed_attempts,
            attempts_remaining: threshold.saturating_sub(file.failed_attempts),
            locked_out_until: file.active_lockout(now).map(|(until, _)| until),
            expires_in_seconds,
            key_loaded: keys.has_key(),
            key_protected: keys.is_protected(),
        })
    }

    /// Copy of the active key.
    ///
    /// `SessionLocked` if the session is not unlocked; `KeyUnavailable` if
    /// it is but this process has not been given the password.
    pub fn key(&self) -> Result<KeyMaterial> {
        let extend = self.config.extend_on_activity;
        let auto_lock = self.config.auto_lock();
        self.transact(|file, now| {
            if !file.is_unlocked() {
                return Err(VaultError::SessionLocked);
            }
            if extend {
                file.extend(now, auto_lock);
            }
            Ok(())
        })?;
        self.keys().get_key()
    }

    pub fn key_metadata(&self) -> Option<KeyMetadata> {
        self.keys().metadata().cloned()
    }

    /// Open the vault database with the active key, creating it on first use.
    pub fn open_store(&self) -> Result<EncryptedStore> {
        let key = self.key()?;
        let path = self.paths.database();
        if EncryptedStore::exists(&path) {
            EncryptedStore::open(&path, &key)
        } else {
            EncryptedStore::create(&path, &key)
        }
    }

    /// Import a plaintext database as this vault's encrypted database.
    ///
    /// The vault must not have a database yet.
    pub fn migrate_from(&self, plaintext: &Path) -> Result<MigrationReport> {
        let key = self.key()?;
        let outcome = EncryptedStore::migrate_to_encrypted(plaintext, &self.paths.database(), &key);
        match &outcome {
            Ok(report) => self.record(
                AuditOperation::Migrate,
                AuditResult::Success,
                json!({ "tables": report.tables, "indexes": report.indexes, "rows": report.rows }),
            ),
            Err(err) => self.record(
                AuditOperation::Migrate,
                AuditResult::Failure,
                json!({ "error": err.to_string() }),
            ),
        }
        outcome
    }

    /// Verify `password` without changing the session. Failures count
    /// toward lockout.
    pub fn confirm_password(&self, password: &str) -> Result<KeyMaterial> {
        self.confirm_for(password, AuditOperation::Unlock)
    }

    pub(crate) fn confirm_for(&self, password: &str, operation: AuditOperation) -> Result<KeyMaterial> {
        self.attempt(password, operation, |_, _, key| Ok(key))
    }

    /// Move to a new password: new salt, new key, new verification record,
    /// and the database re-encrypted under the new key.
    ///
    /// Pass the open store if the caller holds one; otherwise an existing
    /// database file is opened with the old key. The new verification
    /// record is the commit point of the rekey, so the database is never
    /// left under a key the stored record cannot derive.
    pub fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
        store: Option<&mut EncryptedStore>,
    ) -> Result<()> {
        validate_passphrase(new_password)?;
        let current = self.confirm_for(old_password, AuditOperation::PasswordChange)?;
        self.rekey_to(&current, new_password, store, AuditOperation::PasswordChange)
    }

    /// Same password, fresh salt: every byte of the database ends up under
    /// a key the old salt can no longer produce.
    pub fn rotate_key(&self, password: &str, store: Option<&mut EncryptedStore>) -> Result<()> {
        let current = self.confirm_for(password, AuditOperation::KeyRotation)?;
        self.rotate_with(&current, password, store)
    }

    /// Rotation for a caller that has already confirmed `password`.
    pub(crate) fn rotate_with(
        &self,
        current: &KeyMaterial,
        password: &str,
        store: Option<&mut EncryptedStore>,
    ) -> Result<()> {
        self.rekey_to(current, password, store, AuditOperation::KeyRotation)
    }

    fn rekey_to(
        &self,
        current: &KeyMaterial,
        password: &str,
        store: Option<&mut EncryptedStore>,
        operation: AuditOperation,
    ) -> Result<()> {
        let outcome = self.transact(|file, _| {
            let (verification, new_key) = VerificationStore::create(password, &self.crypto)?;
            let record_path = self.paths.verification();
            let commit = || verification.save(&record_path);

            let database = self.paths.database();
            match store {
                Some(store) => store.rekey(&new_key, commit)?,
                None if EncryptedStore::exists(&database) => {
                    EncryptedStore::open(&database, current)?.rekey(&new_key, commit)?
                }
                None => commit()?,
            }

            let mut keys = self.keys();
            if file.is_unlocked() {
                keys.rotate(new_key);
            } else {
                keys.clear();
            }
            Ok(())
        });

        match &outcome {
            Ok(()) => {
                self.record(operation, AuditResult::Success, json!({}));
                tracing::info!(operation = %operation, "Key rotated");
            }
            Err(err) => self.record(
                operation,
                AuditResult::Failure,
                json!({ "error": err.to_string() }),
            ),
        }
        outcome
    }

    /// Destroy every key, record and document. Needs no password; refuses
    /// unless `confirm` is true.
    pub fn reset(&self, confirm: bool) -> Result<()> {
        if !confirm {
            self.record(AuditOperation::Reset, AuditResult::Denied, json!({}));
            return Err(VaultError::ConfirmationRequired(
                "reset permanently destroys the verification record, session state, \
                 tier assignments and the encrypted database"
                    .to_string(),
            ));
        }

        let _guard = FileLock::exclusive(&self.paths.session_lock())?;
        self.keys().clear();

        let mut targets = vec![
            self.paths.verification(),
            self.paths.session(),
            self.paths.tiers(),
        ];
        targets.extend(EncryptedStore::artifacts(&self.paths.database()));

        let mut removed = Vec::new();
        for path in targets {
            if remove_if_exists(&path)? {
                if let Some(name) = path.file_name() {
                    removed.push(name.to_string_lossy().to_string());
                }
            }
        }

        self.record(
            AuditOperation::Reset,
            AuditResult::Success,
            json!({ "removed": removed }),
        );
        tracing::warn!("Vault reset; key material and data destroyed");
        Ok(())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("root", &self.paths.root())
            .field("config", &self.config)
            .field("audit", &self.audit.is_some())
            .finish()
    }
}
