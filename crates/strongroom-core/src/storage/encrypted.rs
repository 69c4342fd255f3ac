//! SQLCipher-backed document store.
//!
//! The raw key is handed to SQLCipher as a hex blob (`x'…'`), so no second
//! KDF runs inside the engine. Opening with the wrong key fails on the first
//! schema read with `SQLITE_NOTADB`, which maps to
//! [`VaultError::DatabaseLocked`].

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, ErrorCode, OpenFlags};
use zeroize::Zeroizing;

use super::traits::{DocumentStore, OverwriteHook};
use super::types::NewDocument;
use crate::crypto::KeyMaterial;
use crate::error::{Result, VaultError};
use crate::fs::{remove_if_exists, rename_with_fallback, set_owner_only, sibling_path, sync_file};

/// Staging file for a rekey in progress.
const REKEY_SUFFIX: &str = ".rekey";
/// Staging file for a migration in progress.
const PARTIAL_SUFFIX: &str = ".partial";
/// SQLCipher raw keys are exactly 256 bits.
const PAGE_KEY_LENGTH: usize = 32;
const PAGE_KEY_CONTEXT: &str = "strongroom 2024 sqlcipher page key";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id TEXT NOT NULL,
        ordinal INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB,

        FOREIGN KEY(document_id) REFERENCES documents(id)
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
"#;

/// Outcome of [`EncryptedStore::migrate_to_encrypted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub tables: Vec<String>,
    pub indexes: Vec<String>,
    pub rows: u64,
}

/// A document index database, encrypted unless opened in plaintext mode.
pub struct EncryptedStore {
    path: PathBuf,
    conn: Connection,
    encrypted: bool,
}

impl EncryptedStore {
    fn sqlite_error(err: rusqlite::Error) -> VaultError {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::NotADatabase => {
                VaultError::DatabaseLocked
            }
            _ => VaultError::from(err),
        }
    }

    /// `x'…'` literal SQLCipher accepts as a raw page key.
    fn raw_key_literal(key: &KeyMaterial) -> Zeroizing<String> {
        if key.len() == PAGE_KEY_LENGTH {
            Zeroizing::new(format!("x'{}'", hex::encode_upper(key.as_bytes())))
        } else {
            let mut page_key = blake3::derive_key(PAGE_KEY_CONTEXT, key.as_bytes());
            let literal = Zeroizing::new(format!("x'{}'", hex::encode_upper(page_key)));
            zeroize::Zeroize::zeroize(&mut page_key);
            literal
        }
    }

    /// Run a statement to completion, discarding any rows it returns.
    fn run_to_completion(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while rows.next()?.is_some() {}
        Ok(())
    }

    fn apply_key(conn: &Connection, key: &KeyMaterial) -> Result<()> {
        let literal = Self::raw_key_literal(key);
        let pragma = Zeroizing::new(format!("PRAGMA key = \"{}\"", literal.as_str()));
        Self::run_to_completion(conn, &pragma).map_err(Self::sqlite_error)
    }

    /// First read of the schema; this is where SQLCipher checks the key.
    fn check_readable(conn: &Connection) -> Result<()> {
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|_| ())
        .map_err(Self::sqlite_error)
    }

    fn open_existing(path: &Path) -> Result<Connection> {
        if !path.exists() {
            return Err(VaultError::NotFound(format!(
                "Database not found: {}",
                path.display()
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Connection::open_with_flags(path, flags).map_err(Self::sqlite_error)
    }

    fn open_keyed(path: &Path, key: &KeyMaterial) -> Result<Connection> {
        let conn = Self::open_existing(path)?;
        Self::apply_key(&conn, key)?;
        Self::check_readable(&conn)?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn from_conn(path: &Path, conn: Connection, encrypted: bool) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            path: path.to_path_buf(),
            conn,
            encrypted,
        })
    }

    /// Create a new encrypted database at `path`.
    pub fn create(path: &Path, key: &KeyMaterial) -> Result<Self> {
        if path.exists() {
            return Err(VaultError::Storage(format!(
                "Database already exists: {}",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;
        Self::apply_key(&conn, key)?;
        let store = Self::from_conn(path, conn, true)?;
        set_owner_only(path)?;
        tracing::info!(path = %path.display(), "Created encrypted database");
        Ok(store)
    }

    /// Create a new unencrypted database (import sources, tests).
    pub fn create_plaintext(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(VaultError::Storage(format!(
                "Database already exists: {}",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;
        Self::from_conn(path, conn, false)
    }

    /// Open an encrypted database.
    ///
    /// Finishes or discards an interrupted rekey: if the primary file
    /// rejects `key` but a staged `.rekey` file accepts it, the staged file
    /// is promoted; if the primary accepts `key`, a leftover staged file is
    /// deleted.
    pub fn open(path: &Path, key: &KeyMaterial) -> Result<Self> {
        let staging = sibling_path(path, REKEY_SUFFIX);

        match Self::open_keyed(path, key) {
            Ok(conn) => {
                if remove_if_exists(&staging)? {
                    tracing::warn!(
                        path = %path.display(),
                        "Discarded incomplete rekey staging file"
                    );
                }
                Self::from_conn(path, conn, true)
            }
            Err(VaultError::DatabaseLocked) | Err(VaultError::NotFound(_))
                if staging.exists() =>
            {
                drop(Self::open_keyed(&staging, key)?);
                rename_with_fallback(&staging, path)?;
                tracing::warn!(
                    path = %path.display(),
                    "Completed interrupted rekey from staging file"
                );
                let conn = Self::open_keyed(path, key)?;
                Self::from_conn(path, conn, true)
            }
            Err(err) => Err(err),
        }
    }

    /// Open an unencrypted database. An encrypted file fails with
    /// [`VaultError::DatabaseLocked`].
    pub fn open_plaintext(path: &Path) -> Result<Self> {
        let conn = Self::open_existing(path)?;
        Self::check_readable(&conn)?;
        Self::from_conn(path, conn, false)
    }

    /// Whether a database (or a committed rekey of one) exists at `path`.
    pub fn exists(path: &Path) -> bool {
        path.exists() || sibling_path(path, REKEY_SUFFIX).exists()
    }

    /// Every file a database at `path` may leave behind, including
    /// staging and journal files.
    pub fn artifacts(path: &Path) -> Vec<PathBuf> {
        let mut paths = vec![path.to_path_buf()];
        for suffix in [REKEY_SUFFIX, PARTIAL_SUFFIX, "-journal", "-wal", "-shm"] {
            paths.push(sibling_path(path, suffix));
        }
        paths
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Underlying connection for the host application's own queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Copy every table, index, trigger and view from `conn` into a fresh
    /// file at `target` encrypted under `key`.
    fn export_to(conn: &Connection, target: &Path, key: &KeyMaterial) -> Result<()> {
        let literal = Self::raw_key_literal(key);
        let target_str = target.to_string_lossy().to_string();
        conn.execute(
            "ATTACH DATABASE ?1 AS strongroom_export KEY ?2",
            params![target_str, literal.as_str()],
        )?;
        let exported = Self::run_to_completion(conn, "SELECT sqlcipher_export('strongroom_export')");
        let detached = conn.execute("DETACH DATABASE strongroom_export", []);
        exported?;
        detached?;
        Ok(())
    }

    fn user_tables(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn user_indexes(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'index' AND name NOT LIKE 'sqlite_autoindex_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", table.replace('"', "\"\""));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn row_totals(conn: &Connection) -> Result<Vec<(String, u64)>> {
        Self::user_tables(conn)?
            .into_iter()
            .map(|table| {
                let count = Self::count_rows(conn, &table)?;
                Ok((table, count))
            })
            .collect()
    }

    /// Stream a plaintext database into a new encrypted database.
    ///
    /// Tables, indexes and row data are copied by SQLCipher's export. The
    /// destination is written as `<dest>.partial` and only renamed into
    /// place once it has been synced and re-read with `key`; a leftover
    /// `.partial` from an earlier attempt is discarded, never merged. An
    /// existing destination is refused.
    pub fn migrate_to_encrypted(
        plaintext_path: &Path,
        encrypted_path: &Path,
        key: &KeyMaterial,
    ) -> Result<MigrationReport> {
        if encrypted_path.exists() {
            return Err(VaultError::InvalidInput(format!(
                "Destination already exists: {}",
                encrypted_path.display()
            )));
        }

        let source = Self::open_existing(plaintext_path)?;
        Self::check_readable(&source).map_err(|err| match err {
            VaultError::DatabaseLocked => VaultError::InvalidInput(
                "Migration source is not a plaintext database".to_string(),
            ),
            other => other,
        })?;
        let source_totals = Self::row_totals(&source)?;

        let partial = sibling_path(encrypted_path, PARTIAL_SUFFIX);
        if remove_if_exists(&partial)? {
            tracing::warn!(
                path = %partial.display(),
                "Discarded partial migration output from an earlier run"
            );
        }

        if let Err(err) = Self::export_to(&source, &partial, key) {
            let _ = remove_if_exists(&partial);
            return Err(err);
        }
        drop(source);

        let report = match Self::verify_export(&partial, key, &source_totals) {
            Ok(report) => report,
            Err(err) => {
                let _ = remove_if_exists(&partial);
                return Err(err);
            }
        };

        sync_file(&partial)?;
        set_owner_only(&partial)?;
        rename_with_fallback(&partial, encrypted_path)?;

        tracing::info!(
            tables = report.tables.len(),
            indexes = report.indexes.len(),
            rows = report.rows,
            "Migrated plaintext database to encrypted storage"
        );
        Ok(report)
    }

    fn verify_export(
        path: &Path,
        key: &KeyMaterial,
        expected: &[(String, u64)],
    ) -> Result<MigrationReport> {
        let conn = Self::open_keyed(path, key)?;
        let actual = Self::row_totals(&conn)?;
        if actual != expected {
            return Err(VaultError::Storage(
                "Migrated database does not match its source".to_string(),
            ));
        }
        Ok(MigrationReport {
            tables: actual.iter().map(|(name, _)| name.clone()).collect(),
            indexes: Self::user_indexes(&conn)?,
            rows: actual.iter().map(|(_, count)| count).sum(),
        })
    }

    /// Re-encrypt the whole database under `new_key`, copy-then-swap.
    ///
    /// 1. export to `<db>.rekey` under `new_key` and sync it
    /// 2. run `commit` (e.g. persist the new verification record)
    /// 3. rename the staged file over the database and reopen it
    ///
    /// If anything fails before `commit` returns, the original file and key
    /// are untouched and the staged file is removed. After `commit`, an
    /// interrupted swap is finished by the next [`open`](Self::open).
    pub fn rekey<F>(&mut self, new_key: &KeyMaterial, commit: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        if !self.encrypted {
            return Err(VaultError::InvalidInput(
                "Cannot rekey a plaintext database; migrate it first".to_string(),
            ));
        }

        let staging = sibling_path(&self.path, REKEY_SUFFIX);
        remove_if_exists(&staging)?;

        let expected = Self::row_totals(&self.conn)?;
        let staged = Self::export_to(&self.conn, &staging, new_key)
            .and_then(|()| Self::verify_export(&staging, new_key, &expected))
            .and_then(|_| sync_file(&staging))
            .and_then(|()| set_owner_only(&staging));
        if let Err(err) = staged {
            let _ = remove_if_exists(&staging);
            return Err(err);
        }

        if let Err(err) = commit() {
            let _ = remove_if_exists(&staging);
            return Err(err);
        }

        // Release the old file before swapping it out.
        let old = std::mem::replace(&mut self.conn, Connection::open_in_memory()?);
        if let Err((_, err)) = old.close() {
            tracing::warn!("Closing database before swap failed: {}", err);
        }
        if let Err(err) = rename_with_fallback(&staging, &self.path) {
            tracing::warn!(
                path = %self.path.display(),
                "Swap failed; the next open finishes it from the staging file"
            );
            return Err(err.into());
        }
        self.conn = Self::open_keyed(&self.path, new_key)?;
        Self::init_schema(&self.conn)?;

        tracing::info!(path = %self.path.display(), "Database re-encrypted under new key");
        Ok(())
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        Self::user_tables(&self.conn)
    }

    pub fn index_names(&self) -> Result<Vec<String>> {
        Self::user_indexes(&self.conn)
    }

    pub fn row_count(&self, table: &str) -> Result<u64> {
        Self::count_rows(&self.conn, table)
    }

    /// Remove one document's rows in a single transaction, scrubbing them
    /// first when a hook is given.
    fn delete_rows(
        &mut self,
        document_id: &str,
        overwrite: Option<&dyn OverwriteHook>,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let chunks: i64 = tx.query_row(
            "SELECT COUNT(*) FROM chunks WHERE document_id = ?1",
            [document_id],
            |row| row.get(0),
        )?;
        if let Some(hook) = overwrite {
            let touched = hook.overwrite(&tx, document_id)?;
            tracing::debug!(document_id, touched, "Overwrote rows before delete");
        }
        tx.execute("DELETE FROM chunks WHERE document_id = ?1", [document_id])?;
        tx.execute("DELETE FROM documents WHERE id = ?1", [document_id])?;
        tx.commit()?;

        Ok(chunks as usize)
    }
}

impl DocumentStore for EncryptedStore {
    fn insert_document(&mut self, document: &NewDocument) -> Result<()> {
        if document.id.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "Document id cannot be empty".to_string(),
            ));
        }
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO documents (id, source, created_at) VALUES (?1, ?2, ?3)",
            params![document.id, document.source, chrono::Utc::now().to_rfc3339()],
        )?;
        for (ordinal, chunk) in document.chunks.iter().enumerate() {
            tx.execute(
                "INSERT INTO chunks (document_id, ordinal, content, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
                params![document.id, ordinal as i64, chunk.content, chunk.embedding_blob()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_document(
        &mut self,
        document_id: &str,
        overwrite: Option<&dyn OverwriteHook>,
    ) -> Result<usize> {
        let Some(hook) = overwrite else {
            return self.delete_rows(document_id, None);
        };

        // secure_delete is per connection; scope it to this delete.
        Self::run_to_completion(&self.conn, "PRAGMA secure_delete = ON")?;
        let deleted = self.delete_rows(document_id, Some(hook));
        let reset = Self::run_to_completion(&self.conn, "PRAGMA secure_delete = OFF");
        let chunks = deleted?;
        reset?;
        Ok(chunks)
    }

    fn document_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM documents ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn chunk_count(&self, document_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE document_id = ?1",
            [document_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
