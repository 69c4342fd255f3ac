//! Filesystem utilities for atomic, crash-safe replacement of vault files.
//!
//! Every persisted file (verification record, session state, tier map,
//! database) is replaced through a temp file + rename so a killed process
//! leaves either the old or the new version on disk, never a mix.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};

/// Atomically move `temp_path` over `destination`.
///
/// On Unix `rename` replaces the destination atomically, so a failure leaves
/// both files where they were. Windows refuses to rename over an existing
/// file; there the destination is removed first and the rename retried.
///
/// The source is never deleted on failure: for a rekey it is the only copy
/// under the committed key.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if let Err(initial_err) = fs::rename(temp_path, destination) {
            if !destination.exists() {
                return Err(initial_err);
            }
            fs::remove_file(destination)?;
            fs::rename(temp_path, destination).map_err(|retry_err| {
                io::Error::new(
                    retry_err.kind(),
                    format!(
                        "Atomic rename failed (initial: {}, retry: {})",
                        initial_err, retry_err
                    ),
                )
            })?;
        }
        Ok(())
    }
    #[cfg(not(windows))]
    fs::rename(temp_path, destination)
}

/// Sibling path with an extra suffix, e.g. `vault.db` -> `vault.db.rekey`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Write `data` to `path` via a synced temp file and an atomic rename.
///
/// The file is created owner-read/write only on Unix.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = sibling_path(path, &format!(".{}.tmp", std::process::id()));
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| VaultError::Storage(format!("Temp file create failed: {}", e)))?;
    file.write_all(data)
        .map_err(|e| VaultError::Storage(format!("Temp file write failed: {}", e)))?;
    file.sync_all()
        .map_err(|e| VaultError::Storage(format!("Temp file sync failed: {}", e)))?;
    drop(file);
    set_owner_only(&temp_path)?;

    if let Err(e) = rename_with_fallback(&temp_path, path) {
        // The temp copy is only expendable while the old file is still there.
        if path.exists() {
            let _ = fs::remove_file(&temp_path);
        }
        return Err(VaultError::Storage(format!("Atomic rename failed: {}", e)));
    }
    Ok(())
}

/// Flush a finished file to stable storage.
pub fn sync_file(path: &Path) -> Result<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Restrict a file to its owner (0600) where the platform supports it.
pub fn set_owner_only(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
