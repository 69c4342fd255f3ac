//! Best-effort pinning of key buffers in RAM (mlock-style).
//!
//! Locking keeps the pages out of swap. It routinely fails in containers
//! and sandboxes (RLIMIT_MEMLOCK), so callers treat failure as a missing
//! capability rather than an error that stops the operation.

use crate::error::{Result, VaultError};

/// Pin `len` bytes starting at `ptr`.
#[cfg(unix)]
pub(crate) fn lock_region(ptr: *const u8, len: usize) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    // SAFETY: mlock only changes paging behaviour for the given range; the
    // caller passes a pointer/length pair taken from a live allocation.
    let rc = unsafe { libc::mlock(ptr as *const libc::c_void, len) };
    if rc == 0 {
        Ok(())
    } else {
        Err(VaultError::MemoryProtection(format!(
            "mlock failed: {}",
            std::io::Error::last_os_error()
        )))
    }
}

/// Release a region pinned by [`lock_region`].
#[cfg(unix)]
pub(crate) fn unlock_region(ptr: *const u8, len: usize) {
    if len == 0 {
        return;
    }
    // SAFETY: same range that was previously passed to mlock.
    let rc = unsafe { libc::munlock(ptr as *const libc::c_void, len) };
    if rc != 0 {
        tracing::debug!(
            "munlock failed: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
pub(crate) fn lock_region(_ptr: *const u8, _len: usize) -> Result<()> {
    Err(VaultError::MemoryProtection(
        "memory locking is not supported on this platform".to_string(),
    ))
}

#[cfg(not(unix))]
pub(crate) fn unlock_region(_ptr: *const u8, _len: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_length_is_noop() {
        let buf: [u8; 0] = [];
        #[cfg(unix)]
        assert!(lock_region(buf.as_ptr(), 0).is_ok());
        unlock_region(buf.as_ptr(), 0);
    }

    #[test]
    fn test_lock_failure_is_memory_protection_error() {
        let buf = vec![7u8; 64];
        match lock_region(buf.as_ptr(), buf.len()) {
            Ok(()) => unlock_region(buf.as_ptr(), buf.len()),
            Err(err) => assert!(matches!(err, VaultError::MemoryProtection(_))),
        }
    }
}
