//! On-disk layout of a vault directory.

use std::path::{Path, PathBuf};

/// Locations of every file the subsystem persists, rooted at one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    root: PathBuf,
}

impl VaultPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Salt + verification hash (not sensitive).
    pub fn verification(&self) -> PathBuf {
        self.root.join("verification.json")
    }

    /// Persisted session state.
    pub fn session(&self) -> PathBuf {
        self.root.join("session.json")
    }

    /// Lock file guarding read-modify-write of the session state.
    pub fn session_lock(&self) -> PathBuf {
        self.root.join("session.lock")
    }

    /// SQLCipher database holding documents and chunks.
    pub fn database(&self) -> PathBuf {
        self.root.join("index.db")
    }

    /// Document id -> sensitivity tier map.
    pub fn tiers(&self) -> PathBuf {
        self.root.join("tiers.json")
    }

    /// Append-only audit trail.
    pub fn audit(&self) -> PathBuf {
        self.root.join("audit.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_root() {
        let paths = VaultPaths::new("/tmp/vault");
        for path in [
            paths.verification(),
            paths.session(),
            paths.session_lock(),
            paths.database(),
            paths.tiers(),
            paths.audit(),
        ] {
            assert_eq!(path.parent(), Some(Path::new("/tmp/vault")));
        }
    }
}
