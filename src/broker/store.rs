//! Token storage
//!
//! Persistent key/value map from `(user, provider)` to a token record.
//! Reads always go to the backing store — no in-process cache — so a token
//! refreshed by one process instance is immediately visible to the others.
//!
//! Writes are unconditional overwrites. Two concurrent refreshes for the
//! same key may race; the outcome is last-write-wins, which at worst costs
//! one redundant refresh call. This is accepted behavior, not a bug to fix
//! with locking.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{Error, Result};

/// Stored credential for one `(user, provider)` pair.
///
/// Written by the OAuth flow on initial exchange and by the issuance
/// service on refresh; no other component touches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Access token, opaque and provider-specific
    pub access_token: String,

    /// Refresh token; absent for providers that never issue one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Expiry as epoch milliseconds.
    ///
    /// Non-expiring providers get a far-future sentinel instead of an
    /// absent value, so every expiry check is the same comparison.
    pub expires_at: i64,

    /// Last granted scope string, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenRecord {
    /// Whether the token is past its expiry at `now_ms`.
    #[must_use]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}

/// Injected storage abstraction for token records.
///
/// Business logic never reaches for a concrete store; tests substitute
/// [`MemoryTokenStore`].
#[async_trait]
pub trait TokenStore: Send + Sync + 'static {
    /// Load the record for a key, if one exists.
    async fn get(&self, user_id: &str, provider: &str) -> Result<Option<TokenRecord>>;

    /// Store a record, replacing any prior record for the key in full.
    async fn put(&self, user_id: &str, provider: &str, record: TokenRecord) -> Result<()>;
}

/// File-backed token store: one JSON file per `(user, provider)` key.
pub struct FileTokenStore {
    /// Base directory for token files
    base_dir: PathBuf,
}

impl FileTokenStore {
    /// Create a store rooted at the given directory, creating it if needed.
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir)
                .map_err(|e| Error::Internal(format!("Failed to create token dir: {e}")))?;
        }
        Ok(Self { base_dir })
    }

    /// Create a store in the default location (`~/.toolhub/tokens`).
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Internal("Cannot determine home directory".to_string()))?;
        Self::new(home.join(".toolhub").join("tokens"))
    }

    fn storage_key(user_id: &str, provider: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(user_id.as_bytes());
        hasher.update(b":");
        hasher.update(provider.as_bytes());
        let hash = hasher.finalize();
        hash.iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    fn record_path(&self, user_id: &str, provider: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.json", Self::storage_key(user_id, provider)))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, user_id: &str, provider: &str) -> Result<Option<TokenRecord>> {
        let path = self.record_path(user_id, provider);
        if !path.exists() {
            debug!(user = %user_id, provider = %provider, "No stored token record");
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Internal(format!("Failed to read token file: {e}")))?;
        let record: TokenRecord = serde_json::from_str(&content)
            .map_err(|e| Error::Internal(format!("Failed to parse token record: {e}")))?;
        Ok(Some(record))
    }

    async fn put(&self, user_id: &str, provider: &str, record: TokenRecord) -> Result<()> {
        let path = self.record_path(user_id, provider);

        let content = serde_json::to_string_pretty(&record)
            .map_err(|e| Error::Internal(format!("Failed to serialize token record: {e}")))?;

        fs::write(&path, content)
            .map_err(|e| Error::Internal(format!("Failed to write token file: {e}")))?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&path, perms);
        }

        info!(user = %user_id, provider = %provider, "Stored token record");
        Ok(())
    }
}

/// In-memory token store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryTokenStore {
    records: DashMap<(String, String), TokenRecord>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, user_id: &str, provider: &str) -> Result<Option<TokenRecord>> {
        Ok(self
            .records
            .get(&(user_id.to_string(), provider.to_string()))
            .map(|r| r.clone()))
    }

    async fn put(&self, user_id: &str, provider: &str, record: TokenRecord) -> Result<()> {
        self.records
            .insert((user_id.to_string(), provider.to_string()), record);
        Ok(())
    }
}
