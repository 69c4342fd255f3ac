use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rusqlite::Connection;
use tempfile::TempDir;

use strongroom_core::{
    CryptoConfig, DocumentStore, EncryptedStore, KeyStore, NewChunk, NewDocument, SessionConfig,
    SessionManager, VaultError, VaultPaths,
};

const PASSWORD: &str = "correct-horse-battery";

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_strongroom"))
}

fn cheap_crypto() -> CryptoConfig {
    CryptoConfig {
        memory_cost_kb: 8192,
        iterations: 1,
        parallelism: 1,
        ..CryptoConfig::default()
    }
}

/// A scratch vault with a config file selecting cheap KDF parameters.
struct TestVault {
    dir: TempDir,
}

impl TestVault {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = "[crypto]\nmemory_cost_kb = 8192\niterations = 1\nparallelism = 1\n";
        std::fs::write(dir.path().join("config.toml"), config).expect("write config");
        Self { dir }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("vault")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(bin());
        cmd.args(args)
            .arg("--no-input")
            .env("STRONGROOM_HOME", self.root())
            .env("STRONGROOM_CONFIG", self.dir.path().join("config.toml"))
            .env("XDG_CONFIG_HOME", self.dir.path().join("xdg-config"))
            .env("XDG_DATA_HOME", self.dir.path().join("xdg-data"))
            .env_remove("STRONGROOM_PASSWORD")
            .env_remove("STRONGROOM_NEW_PASSWORD")
            .env_remove("STRONGROOM_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("run strongroom")
    }

    fn run_with_password(&self, args: &[&str], password: &str) -> Output {
        self.command(args)
            .env("STRONGROOM_PASSWORD", password)
            .output()
            .expect("run strongroom")
    }

    fn init_and_unlock(&self) {
        assert_success(&self.run_with_password(&["init"], PASSWORD));
        assert_success(&self.run_with_password(&["unlock"], PASSWORD));
    }

    /// Core handle on the same vault, for seeding and inspecting data.
    fn core_session(&self) -> SessionManager {
        SessionManager::open(VaultPaths::new(self.root()), SessionConfig::default())
            .expect("session")
            .with_crypto_config(cheap_crypto())
            .with_key_store(KeyStore::unprotected())
    }

    fn status_json(&self) -> serde_json::Value {
        let output = self.run(&["status", "--json"]);
        assert_success(&output);
        serde_json::from_slice(&output.stdout).expect("status json")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed (code {:?})\nstdout: {}\nstderr: {}",
        output.status.code(),
        stdout(output),
        stderr(output)
    );
}

fn assert_code(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "stdout: {}\nstderr: {}",
        stdout(output),
        stderr(output)
    );
}

fn seed_documents(vault: &TestVault, ids: &[&str]) {
    let session = vault.core_session();
    session.resume(PASSWORD).expect("resume");
    let mut store = session.open_store().expect("open store");
    for id in ids {
        store
            .insert_document(
                &NewDocument::new(*id, format!("/docs/{}.md", id))
                    .with_chunk(NewChunk::new(format!("{} first", id)))
                    .with_chunk(NewChunk::new(format!("{} second", id))),
            )
            .expect("insert");
    }
}

#[test]
fn test_cli_init_unlock_status_lock() {
    let vault = TestVault::new();

    let init = vault.run_with_password(&["init"], PASSWORD);
    assert_success(&init);
    assert!(stdout(&init).contains("Vault initialized"));
    assert_code(&vault.run_with_password(&["init"], PASSWORD), 4);

    assert_eq!(vault.status_json()["state"], "locked");

    assert_success(&vault.run_with_password(&["unlock"], PASSWORD));
    let status = vault.status_json();
    assert_eq!(status["state"], "unlocked");
    assert!(status["expires_in_seconds"].as_i64().expect("expiry") > 0);
    assert_eq!(status["key_loaded"], false);

    let extend = vault.run(&["unlock", "--extend"]);
    assert_success(&extend);
    assert!(stdout(&extend).contains("Session extended"));

    assert_success(&vault.run(&["lock"]));
    assert_eq!(vault.status_json()["state"], "locked");
}

#[test]
fn test_cli_unlock_without_password_fails_cleanly() {
    let vault = TestVault::new();
    assert_success(&vault.run_with_password(&["init"], PASSWORD));

    let output = vault.run(&["unlock"]);
    assert_code(&output, 4);
    assert!(stderr(&output).contains("STRONGROOM_PASSWORD"));
}

#[test]
fn test_cli_lockout_exit_codes() {
    let vault = TestVault::new();
    assert_success(&vault.run_with_password(&["init"], PASSWORD));

    for _ in 0..5 {
        assert_code(&vault.run_with_password(&["unlock"], "wrong-password"), 5);
    }
    let denied = vault.run_with_password(&["unlock"], PASSWORD);
    assert_code(&denied, 6);
    assert!(stderr(&denied).contains("locked out"));

    let status = vault.status_json();
    assert_eq!(status["state"], "locked");
    assert!(!status["locked_out_until"].is_null());
    assert_eq!(status["attempts_remaining"], 0);
}

#[test]
fn test_cli_reset_requires_confirmation_flag() {
    let vault = TestVault::new();
    vault.init_and_unlock();

    let refused = vault.run(&["password", "reset"]);
    assert_code(&refused, 4);
    assert!(stderr(&refused).contains("--confirm-data-loss"));
    assert!(vault.root().join("verification.json").exists());

    assert_success(&vault.run(&["password", "reset", "--confirm-data-loss"]));
    assert_eq!(vault.status_json()["state"], "uninitialized");
    assert!(!vault.root().join("verification.json").exists());
    assert_code(&vault.run_with_password(&["unlock"], PASSWORD), 3);
}

#[test]
fn test_cli_tier_gating_across_invocations() {
    let vault = TestVault::new();
    assert_success(&vault.run_with_password(&["init"], PASSWORD));

    assert_success(&vault.run(&["tier", "set", "critical", "diary"]));
    let show = vault.run(&["tier", "show", "diary", "--json"]);
    assert_success(&show);
    let value: serde_json::Value = serde_json::from_slice(&show.stdout).expect("json");
    assert_eq!(value["tier"], "critical");
    assert_eq!(value["accessible"], false);

    assert_code(&vault.run(&["tier", "demote", "diary"]), 5);

    assert_success(&vault.run_with_password(&["unlock"], PASSWORD));
    let demote = vault.run(&["tier", "demote", "diary"]);
    assert_success(&demote);
    assert!(stdout(&demote).contains("sensitive"));

    assert_success(&vault.run(&["tier", "set", "public", "recipes", "notes"]));
    let list = vault.run(&["tier", "list", "--json"]);
    assert_success(&list);
    let entries: Vec<serde_json::Value> = serde_json::from_slice(&list.stdout).expect("json");
    assert_eq!(entries.len(), 3);
    assert!(entries
        .iter()
        .any(|entry| entry["id"] == "diary" && entry["tier"] == "sensitive"));

    let public = vault.run(&["tier", "list", "--tier", "public", "--json"]);
    let public: Vec<serde_json::Value> = serde_json::from_slice(&public.stdout).expect("json");
    assert_eq!(public.len(), 2);

    assert_code(&vault.run(&["tier", "set", "secret", "diary"]), 4);
}

#[test]
fn test_cli_delete_and_purge() {
    let vault = TestVault::new();
    vault.init_and_unlock();
    seed_documents(&vault, &["doc-a", "doc-b", "doc-c"]);

    assert_code(
        &vault.run_with_password(&["delete", "doc-b", "--purge"], PASSWORD),
        4,
    );
    let both = vault.run_with_password(
        &["delete", "doc-b", "--secure", "--purge", "--confirm-data-loss"],
        PASSWORD,
    );
    assert_code(&both, 2);
    assert!(stderr(&both).contains("cannot be used with"));

    let deleted = vault.run_with_password(&["delete", "doc-a"], PASSWORD);
    assert_success(&deleted);
    assert!(stdout(&deleted).contains("doc-a"));

    let core = vault.core_session();
    core.resume(PASSWORD).expect("resume");
    let old_key = core.key().expect("key");

    let purged = vault.run_with_password(
        &["delete", "doc-b", "--purge", "--confirm-data-loss"],
        PASSWORD,
    );
    assert_success(&purged);
    assert!(stdout(&purged).contains("key rotated"));

    let database = VaultPaths::new(vault.root()).database();
    assert!(matches!(
        EncryptedStore::open(&database, &old_key),
        Err(VaultError::DatabaseLocked)
    ));

    let core = vault.core_session();
    core.resume(PASSWORD).expect("same password after rotation");
    let store = core.open_store().expect("open under new key");
    assert_eq!(store.document_ids().expect("ids"), vec!["doc-c".to_string()]);

    assert_success(&vault.run(&["lock"]));
    assert_code(&vault.run_with_password(&["delete", "doc-c"], PASSWORD), 5);
}

#[test]
fn test_cli_password_change() {
    let vault = TestVault::new();
    vault.init_and_unlock();
    seed_documents(&vault, &["doc-a"]);

    let change = vault
        .command(&["password", "change"])
        .env("STRONGROOM_PASSWORD", PASSWORD)
        .env("STRONGROOM_NEW_PASSWORD", "a-brand-new-secret")
        .output()
        .expect("run");
    assert_success(&change);

    assert_success(&vault.run(&["lock"]));
    assert_code(&vault.run_with_password(&["unlock"], PASSWORD), 5);
    assert_success(&vault.run_with_password(&["unlock"], "a-brand-new-secret"));

    let core = vault.core_session();
    core.resume("a-brand-new-secret").expect("resume");
    assert_eq!(core.open_store().expect("open").chunk_count("doc-a").expect("count"), 2);
}

fn plaintext_database(path: &Path) {
    let conn = Connection::open(path).expect("open plaintext");
    conn.execute_batch(
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);
         CREATE INDEX idx_notes_body ON notes(body);
         INSERT INTO notes (body) VALUES ('alpha'), ('beta'), ('gamma');",
    )
    .expect("seed plaintext");
}

#[test]
fn test_cli_migrate() {
    let vault = TestVault::new();
    vault.init_and_unlock();
    let source = vault.dir.path().join("plain.db");
    plaintext_database(&source);
    let source_arg = source.to_string_lossy().to_string();

    let migrated = vault.run_with_password(&["migrate", &source_arg], PASSWORD);
    assert_success(&migrated);
    let out = stdout(&migrated);
    assert!(out.contains("rows=3"));
    assert!(out.contains("idx_notes_body"));

    let raw = std::fs::read(VaultPaths::new(vault.root()).database()).expect("read database");
    assert!(!raw.windows(5).any(|window| window == b"gamma"));

    assert_code(&vault.run_with_password(&["migrate", &source_arg], PASSWORD), 4);

    let missing = vault.dir.path().join("missing.db");
    assert_code(
        &vault.run_with_password(&["migrate", &missing.to_string_lossy()], PASSWORD),
        3,
    );
}

#[test]
fn test_cli_audit_list_verify_rotate() {
    let vault = TestVault::new();
    assert_success(&vault.run_with_password(&["init"], PASSWORD));
    assert_code(&vault.run_with_password(&["unlock"], "wrong-password"), 5);
    assert_success(&vault.run_with_password(&["unlock"], PASSWORD));
    assert_success(&vault.run(&["lock"]));

    let verify = vault.run(&["audit", "verify"]);
    assert_success(&verify);
    assert!(stdout(&verify).contains("intact (4 entries)"));

    let unlocks = vault.run(&["audit", "list", "--operation", "unlock", "--json"]);
    assert_success(&unlocks);
    let entries: Vec<serde_json::Value> = serde_json::from_slice(&unlocks.stdout).expect("json");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["result"], "failure");
    assert_eq!(entries[1]["result"], "success");

    let failures = vault.run(&["audit", "list", "--result", "failure", "--json"]);
    let failures: Vec<serde_json::Value> = serde_json::from_slice(&failures.stdout).expect("json");
    assert_eq!(failures.len(), 1);

    assert_code(&vault.run(&["audit", "rotate"]), 4);
    let rotate = vault.run(&["audit", "rotate", "--keep", "2"]);
    assert_success(&rotate);
    assert!(stdout(&rotate).contains("Removed 2"));
    assert_success(&vault.run(&["audit", "verify"]));
}

#[test]
fn test_cli_completions() {
    let vault = TestVault::new();
    let output = vault.run(&["completions", "bash"]);
    assert_success(&output);
    assert!(stdout(&output).contains("strongroom"));
}
