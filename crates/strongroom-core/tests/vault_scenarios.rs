use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use rusqlite::Connection;
use tempfile::TempDir;

use strongroom_core::{
    AuditConfig, AuditFilter, AuditLog, AuditOperation, AuditResult, CryptoConfig, DataTier,
    DeletionLevel, DocumentStore, EncryptedStore, KeyMaterial, KeyStore, ManualClock, NewChunk,
    NewDocument, SecureDeleter, SessionConfig, SessionManager, TierManager, VaultError,
    VaultPaths,
};

const PASSWORD: &str = "correct-horse";

fn fast_crypto() -> CryptoConfig {
    CryptoConfig {
        memory_cost_kb: 8192,
        iterations: 1,
        parallelism: 1,
        ..CryptoConfig::default()
    }
}

struct Vault {
    _dir: TempDir,
    session: SessionManager,
    clock: Arc<ManualClock>,
}

fn vault() -> Vault {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let clock = Arc::new(ManualClock::default());
    let paths = VaultPaths::new(dir.path());
    let audit = AuditLog::new(paths.audit(), AuditConfig::default()).with_clock(clock.clone());
    let session = SessionManager::open(paths, SessionConfig::default())
        .expect("default config should be valid")
        .with_crypto_config(fast_crypto())
        .with_clock(clock.clone())
        .with_key_store(KeyStore::unprotected())
        .with_audit(audit);
    session.init(PASSWORD).expect("init should succeed");
    Vault {
        _dir: dir,
        session,
        clock,
    }
}

#[test]
fn test_lockout_then_recovery_after_window() {
    let vault = vault();

    for attempt in 1..=5 {
        let err = vault
            .session
            .unlock("wrong-password")
            .expect_err("wrong password should fail");
        assert!(err.is_auth_failure(), "attempt {} should be auth failure", attempt);
    }

    let err = vault
        .session
        .unlock(PASSWORD)
        .expect_err("correct password should be refused during lockout");
    match err {
        VaultError::Lockout {
            remaining_seconds, ..
        } => assert!(remaining_seconds > 0 && remaining_seconds <= 15 * 60),
        other => panic!("expected lockout, got {:?}", other),
    }
    assert!(!vault.session.is_active());

    vault.clock.advance(Duration::minutes(16));
    vault
        .session
        .unlock(PASSWORD)
        .expect("unlock should succeed after lockout window");
    assert!(vault.session.is_active());
    assert_eq!(vault.session.status().expect("status").failed_attempts, 0);

    let audit = vault.session.audit_log().expect("audit configured");
    let denied = audit
        .query(
            &AuditFilter::new()
                .operation(AuditOperation::Unlock)
                .result(AuditResult::Denied),
        )
        .expect("query should succeed");
    assert_eq!(denied.len(), 1);
    assert!(audit.verify().expect("verify").is_intact());
}

#[test]
fn test_migrate_preserves_rows_and_indexes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let plain = dir.path().join("plain.db");
    let encrypted = dir.path().join("encrypted.db");

    let conn = Connection::open(&plain).expect("open plaintext");
    conn.execute_batch(
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);
         CREATE INDEX idx_notes_body ON notes(body);
         INSERT INTO notes (body) VALUES ('first'), ('second');",
    )
    .expect("seed plaintext");
    drop(conn);

    let key = KeyMaterial::from_bytes(vec![7u8; 32]);
    let report = EncryptedStore::migrate_to_encrypted(&plain, &encrypted, &key)
        .expect("migration should succeed");
    assert_eq!(report.rows, 2);
    assert!(report.tables.contains(&"notes".to_string()));
    assert!(report.indexes.contains(&"idx_notes_body".to_string()));

    let store = EncryptedStore::open(&encrypted, &key).expect("open migrated");
    let bodies: Vec<String> = {
        let mut stmt = store
            .connection()
            .prepare("SELECT body FROM notes ORDER BY id")
            .expect("prepare");
        let rows = stmt
            .query_map([], |row| row.get(0))
            .expect("query")
            .collect::<Result<Vec<String>, _>>()
            .expect("rows");
        rows
    };
    assert_eq!(bodies, vec!["first".to_string(), "second".to_string()]);
    assert!(store
        .index_names()
        .expect("indexes")
        .contains(&"idx_notes_body".to_string()));

    let raw = std::fs::read(&encrypted).expect("read encrypted file");
    assert!(!raw.windows(6).any(|window| window == b"second"));
    assert!(!dir.path().join("encrypted.db.partial").exists());
}

#[test]
fn test_migrate_discards_stale_partial_and_refuses_existing_destination() {
    let dir = tempfile::tempdir().expect("tempdir");
    let plain = dir.path().join("plain.db");
    let encrypted = dir.path().join("encrypted.db");
    let stale = dir.path().join("encrypted.db.partial");

    let conn = Connection::open(&plain).expect("open plaintext");
    conn.execute_batch("CREATE TABLE t (x); INSERT INTO t VALUES (1);")
        .expect("seed");
    drop(conn);
    std::fs::write(&stale, b"leftover from a killed run").expect("write stale partial");

    let key = KeyMaterial::from_bytes(vec![9u8; 32]);
    EncryptedStore::migrate_to_encrypted(&plain, &encrypted, &key).expect("migration");
    assert!(!stale.exists());
    assert_eq!(
        EncryptedStore::open(&encrypted, &key)
            .expect("open")
            .row_count("t")
            .expect("count"),
        1
    );

    let again = EncryptedStore::migrate_to_encrypted(&plain, &encrypted, &key);
    assert!(matches!(again, Err(VaultError::InvalidInput(_))));
}

#[test]
fn test_cryptographic_deletion_defeats_old_key() {
    let vault = vault();
    vault.session.unlock(PASSWORD).expect("unlock");
    let old_key = vault.session.key().expect("key loaded");

    let mut store = vault.session.open_store().expect("open store");
    for id in ["keep", "secret"] {
        store
            .insert_document(
                &NewDocument::new(id, format!("/docs/{}.txt", id))
                    .with_chunk(NewChunk::new(format!("{} body", id)).with_embedding(vec![0.25; 4])),
            )
            .expect("insert");
    }

    let records = SecureDeleter::new(&vault.session)
        .delete(
            &mut store,
            &["secret"],
            DeletionLevel::Cryptographic,
            Some(PASSWORD),
        )
        .expect("cryptographic deletion");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].chunks_removed, 1);
    assert!(records[0].key_rotated);
    drop(store);

    let database = vault.session.paths().database();
    assert!(matches!(
        EncryptedStore::open(&database, &old_key),
        Err(VaultError::DatabaseLocked)
    ));

    vault.session.lock().expect("lock");
    vault.session.unlock(PASSWORD).expect("same password still unlocks");
    let store = vault.session.open_store().expect("open under rotated key");
    assert_eq!(store.document_ids().expect("ids"), vec!["keep".to_string()]);
}

#[test]
fn test_tier_gating_follows_session() {
    let vault = vault();
    let tiers = TierManager::for_session(&vault.session);
    tiers
        .set_tier("diary", DataTier::Critical)
        .expect("setting a higher tier needs no session");
    tiers.set_tier("recipes", DataTier::Public).expect("set");

    let ids = ["diary", "recipes", "notes"];
    assert_eq!(
        tiers.filter_by_tier(&ids, DataTier::Critical).expect("filter"),
        vec!["recipes".to_string(), "notes".to_string()]
    );
    assert!(!tiers.can_access(DataTier::Critical));

    vault.session.unlock(PASSWORD).expect("unlock");
    assert!(tiers.can_access(DataTier::Critical));
    assert_eq!(
        tiers.filter_by_tier(&ids, DataTier::Critical).expect("filter").len(),
        3
    );

    vault.clock.advance(Duration::minutes(15));
    assert!(!tiers.can_access(DataTier::Sensitive));
    assert!(tiers.can_access(DataTier::Public));
}

#[test]
fn test_interrupted_rekey_is_completed_on_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("index.db");
    let old_key = KeyMaterial::from_bytes(vec![1u8; 32]);
    let new_key = KeyMaterial::from_bytes(vec![2u8; 32]);

    let mut store = EncryptedStore::create(&path, &old_key).expect("create");
    store
        .insert_document(&NewDocument::new("doc", "/doc").with_chunk(NewChunk::new("text")))
        .expect("insert");
    drop(store);

    // A rekey that committed its new verification record but died before the
    // swap leaves both files behind.
    std::fs::copy(&path, dir.path().join("staged.db")).expect("copy");
    let mut staged = EncryptedStore::open(&dir.path().join("staged.db"), &old_key).expect("open");
    staged.rekey(&new_key, || Ok(())).expect("rekey copy");
    drop(staged);
    std::fs::rename(dir.path().join("staged.db"), dir.path().join("index.db.rekey"))
        .expect("stage");

    let recovered = EncryptedStore::open(&path, &new_key).expect("open promotes staging");
    assert_eq!(recovered.chunk_count("doc").expect("count"), 1);
    assert!(!Path::new(&dir.path().join("index.db.rekey")).exists());
}

#[test]
fn test_reset_needs_confirmation_and_wipes_vault() {
    let vault = vault();
    vault.session.unlock(PASSWORD).expect("unlock");
    drop(vault.session.open_store().expect("create database"));

    let err = vault.session.reset(false).expect_err("reset without confirmation");
    assert!(matches!(err, VaultError::ConfirmationRequired(_)));
    assert!(vault.session.paths().database().exists());

    vault.session.reset(true).expect("confirmed reset");
    assert!(!vault.session.is_initialized());
    assert!(!vault.session.paths().database().exists());
    assert!(matches!(
        vault.session.unlock(PASSWORD),
        Err(VaultError::NotInitialized)
    ));
}
