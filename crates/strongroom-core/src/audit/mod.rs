//! Append-only, hash-chained audit trail.
//!
//! One JSON object per line. Each entry commits to its predecessor through
//! `prev_hash`, so editing or dropping a line in the middle of the file is
//! detected by [`AuditLog::verify`]. Rotation trims from the front; the
//! first surviving entry's `prev_hash` becomes the new anchor.
//!
//! Audit writes are observability, not a transactional guard: callers log a
//! failed append and carry on.

mod types;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, VaultError};
use crate::fs::{set_owner_only, sibling_path, write_atomic};
use crate::lock::FileLock;

pub use types::{
    AuditConfig, AuditEntry, AuditFilter, AuditOperation, AuditResult, ChainStatus, GENESIS_HASH,
};

#[derive(Debug, Default)]
struct LogScan {
    entries: Vec<AuditEntry>,
    /// Byte offset of a torn final line.
    torn_at: Option<u64>,
    /// The last entry parsed but lacks its newline.
    unterminated: bool,
}

/// Handle on an audit log file.
pub struct AuditLog {
    path: PathBuf,
    config: AuditConfig,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, config: AuditConfig) -> Self {
        Self {
            path: path.into(),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn lock(&self) -> Result<FileLock> {
        FileLock::exclusive(&sibling_path(&self.path, ".lock"))
    }

    /// Append one entry. Returns `Ok(None)` when auditing is disabled.
    pub fn append(
        &self,
        operation: AuditOperation,
        result: AuditResult,
        document_id: Option<&str>,
        details: serde_json::Value,
    ) -> Result<Option<AuditEntry>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let _guard = self.lock()?;
        let scan = self.scan()?;
        if let Some(offset) = scan.torn_at {
            tracing::warn!(offset, "Discarding torn final audit line");
            let file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(offset)?;
            file.sync_data()?;
        }
        let last = scan.entries.last().cloned();
        let (seq, prev_hash) = match last {
            Some(entry) => (entry.seq + 1, entry.hash),
            None => (0, GENESIS_HASH.to_string()),
        };

        let mut entry = AuditEntry {
            seq,
            timestamp: self.clock.now(),
            operation,
            result,
            document_id: document_id.map(str::to_string),
            details,
            prev_hash,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash()?;

        let mut line = Vec::new();
        if scan.unterminated {
            line.push(b'\n');
        }
        serde_json::to_writer(&mut line, &entry)?;
        line.push(b'\n');
        let created = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.sync_data()?;
        if created {
            set_owner_only(&self.path)?;
        }

        tracing::debug!(seq, operation = %operation, result = %result, "Audit entry appended");
        Ok(Some(entry))
    }

    /// Serialize `record` as the details of a new entry.
    pub fn append_record<T: Serialize>(
        &self,
        operation: AuditOperation,
        result: AuditResult,
        document_id: Option<&str>,
        record: &T,
    ) -> Result<Option<AuditEntry>> {
        let details = serde_json::to_value(record)?;
        self.append(operation, result, document_id, details)
    }

    /// Parse the file. A final line without its newline that does not parse
    /// is a write cut short by a crash; it is reported, not an error.
    fn scan(&self) -> Result<LogScan> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LogScan::default())
            }
            Err(err) => return Err(err.into()),
        };

        let mut scan = LogScan::default();
        let mut offset = 0usize;
        let mut lines = bytes.split(|b| *b == b'\n').enumerate().peekable();
        while let Some((index, line)) = lines.next() {
            let start = offset;
            offset += line.len() + 1;
            let last = lines.peek().is_none();
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<AuditEntry>(line) {
                Ok(entry) => {
                    scan.entries.push(entry);
                    scan.unterminated = last;
                }
                Err(_) if last => scan.torn_at = Some(start as u64),
                Err(e) => {
                    return Err(VaultError::Audit(format!(
                        "Malformed entry on line {}: {}",
                        index + 1,
                        e
                    )))
                }
            }
        }
        Ok(scan)
    }

    fn read_entries(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.scan()?.entries)
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        self.read_entries()
    }

    /// Entries matching `filter`, oldest first. `limit` keeps the newest.
    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let mut matched: Vec<AuditEntry> = self
            .read_entries()?
            .into_iter()
            .filter(|entry| filter.matches(entry))
            .collect();
        if let Some(limit) = filter.limit {
            let excess = matched.len().saturating_sub(limit);
            matched.drain(..excess);
        }
        Ok(matched)
    }

    /// Walk the chain and report the first broken link.
    pub fn verify(&self) -> Result<ChainStatus> {
        let scan = self.scan()?;
        let entries = scan.entries;
        let mut previous: Option<&AuditEntry> = None;

        for entry in &entries {
            match previous {
                None => {
                    if entry.seq == 0 && entry.prev_hash != GENESIS_HASH {
                        return Ok(ChainStatus::Broken {
                            seq: entry.seq,
                            reason: "first entry does not start from genesis".to_string(),
                        });
                    }
                }
                Some(prev) => {
                    if entry.seq != prev.seq + 1 {
                        return Ok(ChainStatus::Broken {
                            seq: entry.seq,
                            reason: format!("expected seq {}", prev.seq + 1),
                        });
                    }
                    if entry.prev_hash != prev.hash {
                        return Ok(ChainStatus::Broken {
                            seq: entry.seq,
                            reason: "prev_hash does not match preceding entry".to_string(),
                        });
                    }
                }
            }
            if entry.compute_hash()? != entry.hash {
                return Ok(ChainStatus::Broken {
                    seq: entry.seq,
                    reason: "entry contents do not match its hash".to_string(),
                });
            }
            previous = Some(entry);
        }

        if scan.torn_at.is_some() {
            return Ok(ChainStatus::Broken {
                seq: entries.last().map_or(0, |entry| entry.seq + 1),
                reason: "final line is incomplete (interrupted write)".to_string(),
            });
        }
        Ok(ChainStatus::Intact {
            entries: entries.len(),
        })
    }

    /// Drop the oldest entries beyond `max_entries` and those older than
    /// `max_age`. Returns how many were removed.
    pub fn rotate(&self, max_entries: Option<usize>, max_age: Option<Duration>) -> Result<usize> {
        let _guard = self.lock()?;
        let entries = self.read_entries()?;
        let total = entries.len();

        let cutoff = max_age.map(|age| self.clock.now() - age);
        let mut kept: Vec<AuditEntry> = entries
            .into_iter()
            .filter(|entry| cutoff.map_or(true, |cutoff| entry.timestamp >= cutoff))
            .collect();
        if let Some(max) = max_entries {
            let excess = kept.len().saturating_sub(max);
            kept.drain(..excess);
        }

        let removed = total - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut buffer = Vec::new();
        for entry in &kept {
            serde_json::to_writer(&mut buffer, entry)?;
            buffer.push(b'\n');
        }
        write_atomic(&self.path, &buffer)?;

        tracing::info!(removed, kept = kept.len(), "Audit log rotated");
        Ok(removed)
    }

    /// Rotate using the limits from [`AuditConfig`].
    pub fn rotate_configured(&self) -> Result<usize> {
        let max_age = self
            .config
            .max_age_days
            .map(|days| Duration::days(i64::from(days)));
        self.rotate(self.config.max_entries, max_age)
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}
