//! In-memory custody of the active key.
//!
//! A [`KeyStore`] holds at most one key for the lifetime of a session. The
//! buffer is pinned against swap when the platform allows it, handed out
//! only as independent copies, and overwritten with zeros when the store is
//! cleared, rotated or dropped (including during unwinding).

mod memlock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use zeroize::Zeroize;

use crate::crypto::KeyMaterial;
use crate::error::{Result, VaultError};

/// Audit/diagnostic facts about the held key. Never contains key bytes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeyMetadata {
    pub key_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub length: usize,
    /// Whether the buffer is pinned in RAM.
    pub is_protected: bool,
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Heap buffer holding the key, optionally mlocked.
struct LockedKey {
    bytes: Box<[u8]>,
    locked: bool,
}

impl LockedKey {
    fn new(key: &KeyMaterial, protect: bool) -> Self {
        let bytes: Box<[u8]> = key.as_bytes().to_vec().into_boxed_slice();
        let locked = if protect {
            match memlock::lock_region(bytes.as_ptr(), bytes.len()) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!("Key buffer not protected: {}", err);
                    false
                }
            }
        } else {
            false
        };
        Self { bytes, locked }
    }

    /// Unlock the region, then overwrite every byte with zero.
    ///
    /// Idempotent; `Drop` calls it again.
    fn wipe(&mut self) {
        if self.locked {
            memlock::unlock_region(self.bytes.as_ptr(), self.bytes.len());
            self.locked = false;
        }
        self.bytes.zeroize();
    }
}

impl Drop for LockedKey {
    fn drop(&mut self) {
        self.wipe();
    }
}

/// Holder of the single active key.
pub struct KeyStore {
    slot: Option<LockedKey>,
    metadata: Option<KeyMetadata>,
    protect: bool,
}

impl KeyStore {
    /// Store that attempts to mlock every key it holds.
    pub fn new() -> Self {
        Self {
            slot: None,
            metadata: None,
            protect: true,
        }
    }

    /// Store that never attempts memory locking.
    pub fn unprotected() -> Self {
        Self {
            slot: None,
            metadata: None,
            protect: false,
        }
    }

    /// Take custody of `key`, clearing any key held before.
    ///
    /// The returned metadata reports honestly whether the buffer could be
    /// pinned; failure to pin is logged, not returned.
    pub fn store_key(&mut self, key: KeyMaterial) -> KeyMetadata {
        self.clear();
        self.install(key)
    }

    /// Replace the held key. The old buffer is wiped before the new key is
    /// readable; callers never see an empty store in between because this
    /// takes `&mut self`.
    ///
    /// The old buffer is unlocked before the new one is locked: mlock is per
    /// page and not counted, so the reverse order can unpin both keys.
    pub fn rotate(&mut self, new_key: KeyMaterial) -> KeyMetadata {
        self.clear();
        self.install(new_key)
    }

    fn install(&mut self, key: KeyMaterial) -> KeyMetadata {
        let locked = LockedKey::new(&key, self.protect);
        drop(key);
        let metadata = KeyMetadata {
            key_id: Uuid::new_v4(),
            created_at: Utc::now(),
            length: locked.bytes.len(),
            is_protected: locked.locked,
            access_count: 0,
            last_accessed: None,
        };
        self.slot = Some(locked);
        self.metadata = Some(metadata.clone());
        tracing::debug!(
            key_id = %metadata.key_id,
            protected = metadata.is_protected,
            "Key stored"
        );
        metadata
    }

    /// Independent copy of the held key; bumps the access counter.
    pub fn get_key(&mut self) -> Result<KeyMaterial> {
        let slot = self.slot.as_ref().ok_or(VaultError::KeyUnavailable)?;
        let copy = KeyMaterial::from_bytes(slot.bytes.to_vec());
        if let Some(metadata) = self.metadata.as_mut() {
            metadata.access_count += 1;
            metadata.last_accessed = Some(Utc::now());
        }
        Ok(copy)
    }

    pub fn has_key(&self) -> bool {
        self.slot.is_some()
    }

    /// Whether the held key is pinned in RAM. `false` when empty.
    pub fn is_protected(&self) -> bool {
        self.slot.as_ref().map(|slot| slot.locked).unwrap_or(false)
    }

    pub fn metadata(&self) -> Option<&KeyMetadata> {
        self.metadata.as_ref()
    }

    /// Short BLAKE3 fingerprint of the held key, for diagnostics.
    pub fn fingerprint(&self) -> Option<String> {
        self.slot.as_ref().map(|slot| {
            let hash = blake3::hash(&slot.bytes);
            hash.to_hex()[..16].to_string()
        })
    }

    /// Unlock, zero and release the held key. Safe to call repeatedly.
    pub fn clear(&mut self) {
        if let Some(mut slot) = self.slot.take() {
            slot.wipe();
            tracing::debug!("Key cleared");
        }
        self.metadata = None;
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KeyStore {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("has_key", &self.has_key())
            .field("is_protected", &self.is_protected())
            .finish()
    }
}
