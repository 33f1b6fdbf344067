// ABOUTME: Pending upstream-auth store tracking in-flight outbound OAuth exchanges
// ABOUTME: CSRF state + PKCE verifier per entry, encrypted snapshots, fire-and-forget persistence
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

use crate::crypto::encryption::EncryptionService;
use crate::errors::{AppError, AppResult};
use crate::lifecycle::PeriodicTask;
use crate::oauth2_server::pkce;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Snapshot format version written to disk
const SNAPSHOT_VERSION: u32 = 1;

/// An in-flight outbound OAuth exchange toward the upstream provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuth {
    /// CSRF token; unique and single-use
    pub state: String,
    /// PKCE code verifier to send back at the token exchange
    pub code_verifier: String,
    /// Redirect URI to send back verbatim at the token exchange
    pub redirect_uri: String,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
    /// When the entry becomes unusable
    pub expires_at: DateTime<Utc>,
}

/// Versioned on-disk shape: `{"version": 1, "entries": [...]}`
#[derive(Serialize, Deserialize)]
struct PendingSnapshot {
    version: u32,
    entries: Vec<PendingAuth>,
}

/// What the caller needs to redirect the user to the provider
#[derive(Debug, Clone)]
pub struct CreatedPendingAuth {
    /// CSRF state to embed in the authorization URL
    pub state: String,
    /// PKCE verifier (also held server-side on the pending entry)
    pub code_verifier: String,
    /// S256 challenge to embed in the authorization URL
    pub code_challenge: String,
}

/// Store of pending upstream-auth entries.
///
/// The in-memory table is authoritative; the encrypted snapshot on disk is
/// written fire-and-forget, so mutating methods return before the write
/// resolves. Losing a pending record merely forces the user to restart an
/// interactive flow.
pub struct PendingAuthStore {
    entries: Arc<RwLock<HashMap<String, PendingAuth>>>,
    encryption: Arc<dyn EncryptionService>,
    path: PathBuf,
    ttl: Duration,
}

impl PendingAuthStore {
    /// Create a store persisting to `path`; entries live for `ttl_secs`
    /// seconds. Call [`Self::load`] afterwards to repopulate from disk.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        encryption: Arc<dyn EncryptionService>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            encryption,
            path: path.into(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Repopulate the table from the encrypted snapshot.
    ///
    /// A missing, corrupt or version-mismatched snapshot never prevents
    /// startup - the store simply starts empty. Entries already expired at
    /// load time are filtered out.
    pub async fn load(&self) {
        let plaintext = match self.encryption.decrypt_from_file(&self.path).await {
            Ok(Some(plaintext)) => plaintext,
            Ok(None) => {
                tracing::debug!("No persisted pending upstream-auth entries found");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read pending upstream-auth snapshot, starting empty");
                return;
            }
        };

        let snapshot: PendingSnapshot = match serde_json::from_slice(&plaintext) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Corrupt pending upstream-auth snapshot, starting empty");
                return;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                version = snapshot.version,
                "Dropping pending upstream-auth snapshot with unknown version"
            );
            return;
        }

        let now = Utc::now();
        let mut entries = self.entries.write().await;
        for entry in snapshot.entries {
            if entry.expires_at > now {
                entries.insert(entry.state.clone(), entry);
            }
        }
        tracing::info!(count = entries.len(), "Loaded pending upstream-auth entries");
    }

    /// Start a new outbound flow: generate a PKCE pair and a CSRF state,
    /// record the entry and kick off an asynchronous persist.
    ///
    /// The outbound redirect can proceed immediately; a failed persist is
    /// logged but does not fail the caller, because the value already lives
    /// in memory.
    ///
    /// # Errors
    /// Returns a crypto error if the system RNG fails.
    pub async fn create(&self, redirect_uri: &str) -> AppResult<CreatedPendingAuth> {
        let code_verifier = pkce::generate_default_verifier()?;
        let code_challenge = pkce::challenge_from_verifier(&code_verifier);
        let state = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let entry = PendingAuth {
            state: state.clone(),
            code_verifier: code_verifier.clone(),
            redirect_uri: redirect_uri.to_owned(),
            created_at,
            expires_at: created_at + self.ttl,
        };

        self.entries.write().await.insert(state.clone(), entry);
        self.spawn_persist();

        Ok(CreatedPendingAuth {
            state,
            code_verifier,
            code_challenge,
        })
    }

    /// Look up a pending entry by its CSRF state, lazily deleting it when
    /// the TTL has elapsed.
    pub async fn find_by_state(&self, state: &str) -> Option<PendingAuth> {
        let mut entries = self.entries.write().await;
        let entry = entries.get(state)?;

        if entry.expires_at <= Utc::now() {
            entries.remove(state);
            return None;
        }

        Some(entry.clone())
    }

    /// Delete an entry and trigger an asynchronous re-persist.
    /// Returns whether the entry existed.
    pub async fn remove(&self, state: &str) -> bool {
        let removed = self.entries.write().await.remove(state).is_some();
        if removed {
            self.spawn_persist();
        }
        removed
    }

    /// Delete every expired entry; re-persists once if anything changed.
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let removed = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);
            before - entries.len()
        };

        if removed > 0 {
            tracing::debug!(removed, "Swept expired pending upstream-auth entries");
            if let Err(e) = self.persist().await {
                tracing::warn!(error = %e, "Failed to persist pending upstream-auth entries after sweep");
            }
        }

        removed
    }

    /// Serialize the full table with a version tag and write it encrypted.
    ///
    /// # Errors
    /// Returns a serialization/storage error if encoding or the file write
    /// fails.
    pub async fn persist(&self) -> AppResult<()> {
        let snapshot = {
            let entries = self.entries.read().await;
            PendingSnapshot {
                version: SNAPSHOT_VERSION,
                entries: entries.values().cloned().collect(),
            }
        };

        let plaintext = serde_json::to_vec(&snapshot).map_err(|e| {
            AppError::serialization(format!("Failed to encode pending upstream-auth snapshot: {e}"))
        })?;
        self.encryption.encrypt_to_file(&plaintext, &self.path).await
    }

    /// Spawn the fixed-interval cleanup task. Dropping the returned guard
    /// cancels it, so the timer never keeps the process alive on its own.
    #[must_use]
    pub fn spawn_sweeper(store: Arc<Self>, period: std::time::Duration) -> PeriodicTask {
        PeriodicTask::spawn("pending-auth-sweep", period, move || {
            let store = Arc::clone(&store);
            async move {
                store.cleanup_expired().await;
            }
        })
    }

    /// Fire-and-forget snapshot write; failure is only observed via logging.
    fn spawn_persist(&self) {
        let entries = Arc::clone(&self.entries);
        let encryption = Arc::clone(&self.encryption);
        let path = self.path.clone();

        tokio::spawn(async move {
            let snapshot = {
                let entries = entries.read().await;
                PendingSnapshot {
                    version: SNAPSHOT_VERSION,
                    entries: entries.values().cloned().collect(),
                }
            };

            let plaintext = match serde_json::to_vec(&snapshot) {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode pending upstream-auth snapshot");
                    return;
                }
            };

            if let Err(e) = encryption.encrypt_to_file(&plaintext, &path).await {
                tracing::warn!(error = %e, "Failed to persist pending upstream-auth entries");
            }
        });
    }
}
