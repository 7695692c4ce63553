//! ============================================================================
//! Session Gate - Login State and Persisted Identity
//! ============================================================================
//! Two-state machine: LoggedOut -> LoggedIn(uid) after a credential check
//! against the API. Identity persists in an embedded redb store under the
//! same keys the event's browser build used (`uid`, `dogkingCredential`).
//! Default path: ~/.dogking/session.redb (override via DOGKING_DB_PATH).
//!
//! The credential blob is base64 of a JSON pair. That is an encoding, not
//! encryption: anyone who can read the store file can read the password.
//! Kept for storage-format compatibility; opt-in via `remember`.
//! ============================================================================

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use redb::{Database, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::ScoreApi;
use crate::types::ScoreError;

/// Persisted key holding the bare user id.
pub const UID_KEY: &str = "uid";

/// Persisted key holding the base64 credential blob.
pub const CREDENTIAL_KEY: &str = "dogkingCredential";

const SESSION: TableDefinition<&str, &[u8]> = TableDefinition::new("session");

/// Username/password pair as persisted by the remember-me flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    /// base64(JSON) storage form.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| anyhow!("Failed to serialize credential: {}", e))?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(blob: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(blob)
            .map_err(|_| ScoreError::MalformedCredential)?;
        serde_json::from_slice(&bytes).map_err(|_| ScoreError::MalformedCredential.into())
    }
}

/// Embedded store standing in for the browser's localStorage.
pub struct SessionStore {
    db: Database,
    path: PathBuf,
}

impl SessionStore {
    /// Open (or create) the store at the given path.
    /// If `path` is None, uses DOGKING_DB_PATH env var or ~/.dogking/session.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("DOGKING_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let dir = home.join(".dogking");
            std::fs::create_dir_all(&dir)
                .map_err(|e| anyhow!("Failed to create .dogking directory: {}", e))?;
            dir.join("session.redb")
        };

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open session store: {}", e))?;

        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(SESSION)
                .map_err(|e| anyhow!("Failed to create session table: {}", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self { db, path: db_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(SESSION)
            .map_err(|e| anyhow!("Failed to open session table: {}", e))?;

        match table
            .get(key)
            .map_err(|e| anyhow!("Failed to get {}: {}", key, e))?
        {
            Some(value) => {
                let text = String::from_utf8(value.value().to_vec())
                    .map_err(|e| anyhow!("Corrupt value for {}: {}", key, e))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(SESSION)
                .map_err(|e| anyhow!("Failed to open session table: {}", e))?;
            table
                .insert(key, value.as_bytes())
                .map_err(|e| anyhow!("Failed to insert {}: {}", key, e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn
                .open_table(SESSION)
                .map_err(|e| anyhow!("Failed to open session table: {}", e))?;
            removed = table
                .remove(key)
                .map_err(|e| anyhow!("Failed to remove {}: {}", key, e))?
                .is_some();
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit delete: {}", e))?;
        Ok(removed)
    }

    /// Drop every persisted identity field.
    pub fn clear(&self) -> Result<()> {
        self.delete(UID_KEY)?;
        self.delete(CREDENTIAL_KEY)?;
        Ok(())
    }
}

/// Login gate owning the persisted store. Components receive this instead
/// of reaching into ambient storage.
pub struct SessionGate {
    store: SessionStore,
}

impl SessionGate {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The uid persisted by the last successful login, if any.
    pub fn current_uid(&self) -> Result<Option<String>> {
        self.store.get(UID_KEY)
    }

    /// Check credentials against the API and persist the resulting uid.
    /// With `remember`, also persist the credential blob for auto-restore.
    pub async fn login(
        &self,
        api: &ScoreApi,
        username: &str,
        password: &str,
        remember: bool,
    ) -> Result<String> {
        let uid = api
            .login(username, password)
            .await?
            .ok_or(ScoreError::InvalidCredentials)?;

        self.store.set(UID_KEY, &uid)?;
        if remember {
            let blob = Credential {
                username: username.to_string(),
                password: password.to_string(),
            }
            .encode()?;
            self.store.set(CREDENTIAL_KEY, &blob)?;
        }

        info!("Logged in as {}", uid);
        Ok(uid)
    }

    /// Restore a session on startup. A persisted credential is replayed
    /// against the API; a bare uid with no credential is trusted as-is.
    /// Any failure along the replay path clears the session and comes
    /// back logged out rather than erroring.
    pub async fn restore(&self, api: &ScoreApi) -> Result<Option<String>> {
        let stored_uid = self.store.get(UID_KEY)?;
        let blob = self.store.get(CREDENTIAL_KEY)?;

        let Some(blob) = blob else {
            return Ok(stored_uid);
        };

        let credential = match Credential::decode(&blob) {
            Ok(credential) => credential,
            Err(e) => {
                warn!("Stored credential unreadable: {}", e);
                self.store.clear()?;
                return Ok(None);
            }
        };

        match api.login(&credential.username, &credential.password).await {
            Ok(Some(uid)) => {
                self.store.set(UID_KEY, &uid)?;
                info!("Session restored for {}", uid);
                Ok(Some(uid))
            }
            Ok(None) => {
                warn!("Stored credential no longer valid");
                self.store.clear()?;
                Ok(None)
            }
            Err(e) => {
                warn!("Session verification failed: {}", e);
                self.store.clear()?;
                Ok(None)
            }
        }
    }

    /// Create an account. Client-side checks run first; the username list
    /// is advisory (a fetch failure just skips the uniqueness check, as
    /// the event site did). The new uid is returned but not persisted:
    /// the user still logs in afterwards.
    pub async fn register(
        &self,
        api: &ScoreApi,
        username: &str,
        password: &str,
        confirm: &str,
    ) -> Result<String> {
        let existing = match api.all_usernames().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Username list unavailable, skipping uniqueness check: {}", e);
                Vec::new()
            }
        };
        validate_registration(username, password, confirm, &existing)?;

        api.register(username, password)
            .await?
            .ok_or_else(|| ScoreError::Registration("server rejected the registration".into()).into())
    }

    /// Clear all persisted identity fields.
    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }
}

/// The event's signup rules, verbatim: short names, very short passwords.
pub fn validate_registration(
    username: &str,
    password: &str,
    confirm: &str,
    existing: &[String],
) -> Result<(), ScoreError> {
    if username.chars().count() > 10 {
        return Err(ScoreError::Registration(
            "username must be at most 10 characters".into(),
        ));
    }
    if password.chars().count() > 4 {
        return Err(ScoreError::Registration(
            "password must be at most 4 characters".into(),
        ));
    }
    if password != confirm {
        return Err(ScoreError::Registration("passwords do not match".into()));
    }
    if existing.iter().any(|name| name == username) {
        return Err(ScoreError::Registration("username already taken".into()));
    }
    Ok(())
}
