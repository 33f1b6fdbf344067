// ABOUTME: OAuth 2.0 dynamic client registration and redirect URI validation (RFC 7591)
// ABOUTME: Backed by pluggable storage - ephemeral in-memory or encrypted full-table snapshots
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

use super::models::{
    ClientRegistrationRequest, ClientRegistrationResponse, OAuth2Error, OAuthClient,
};
use crate::crypto::encryption::EncryptionService;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// First-party callback URLs accepted without consulting the allow-list
pub const FIRST_PARTY_REDIRECT_URIS: &[&str] = &[
    "https://app.cadence.dev/oauth/callback",
    "https://cadence.dev/oauth/callback",
];

/// Snapshot format version written to disk
const SNAPSHOT_VERSION: u32 = 1;

/// Persistence strategy for the client table.
///
/// The durable variant loads its full table into memory at startup and
/// writes the full table back on every mutation; it does not stream
/// incremental diffs.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Load the full client table.
    ///
    /// # Errors
    /// Returns an error if the persisted table exists but cannot be decoded.
    async fn load(&self) -> AppResult<HashMap<String, OAuthClient>>;

    /// Persist the full client table.
    ///
    /// # Errors
    /// Returns an error if serialization, encryption or the file write fails.
    async fn persist(&self, clients: &HashMap<String, OAuthClient>) -> AppResult<()>;
}

/// Ephemeral storage for tests and development
pub struct MemoryClientStore;

#[async_trait]
impl ClientStore for MemoryClientStore {
    async fn load(&self) -> AppResult<HashMap<String, OAuthClient>> {
        Ok(HashMap::new())
    }

    async fn persist(&self, _clients: &HashMap<String, OAuthClient>) -> AppResult<()> {
        Ok(())
    }
}

/// Versioned on-disk shape: `{"version": 1, "entries": [...]}`
#[derive(Serialize, Deserialize)]
struct ClientSnapshot {
    version: u32,
    entries: Vec<OAuthClient>,
}

/// Durable storage encrypting the full table to a single file
pub struct EncryptedFileClientStore {
    path: PathBuf,
    encryption: Arc<dyn EncryptionService>,
}

impl EncryptedFileClientStore {
    /// Create a store writing to `path` through the given encryption service
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, encryption: Arc<dyn EncryptionService>) -> Self {
        Self {
            path: path.into(),
            encryption,
        }
    }
}

#[async_trait]
impl ClientStore for EncryptedFileClientStore {
    async fn load(&self) -> AppResult<HashMap<String, OAuthClient>> {
        let Some(plaintext) = self.encryption.decrypt_from_file(&self.path).await? else {
            return Ok(HashMap::new());
        };

        let snapshot: ClientSnapshot = serde_json::from_slice(&plaintext)
            .map_err(|e| AppError::serialization(format!("Corrupt client snapshot: {e}")))?;

        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                version = snapshot.version,
                "Dropping client snapshot with unknown version"
            );
            return Ok(HashMap::new());
        }

        Ok(snapshot
            .entries
            .into_iter()
            .map(|client| (client.client_id.clone(), client))
            .collect())
    }

    async fn persist(&self, clients: &HashMap<String, OAuthClient>) -> AppResult<()> {
        let snapshot = ClientSnapshot {
            version: SNAPSHOT_VERSION,
            entries: clients.values().cloned().collect(),
        };
        let plaintext = serde_json::to_vec(&snapshot)
            .map_err(|e| AppError::serialization(format!("Failed to encode client snapshot: {e}")))?;
        self.encryption.encrypt_to_file(&plaintext, &self.path).await
    }
}

/// OAuth 2.0 client registry (RFC 7591)
///
/// The registry owns the only reference to each registered client; callers
/// receive clones.
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, OAuthClient>>,
    store: Arc<dyn ClientStore>,
    allowed_redirect_uris: Vec<String>,
}

impl ClientRegistry {
    /// Create a registry on top of the given store, loading the persisted
    /// table. A table that fails to decode never prevents startup - the
    /// registry starts empty instead.
    pub async fn new(store: Arc<dyn ClientStore>, allowed_redirect_uris: Vec<String>) -> Self {
        let clients = match store.load().await {
            Ok(clients) => {
                tracing::info!(count = clients.len(), "Loaded registered OAuth clients");
                clients
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load client table, starting empty");
                HashMap::new()
            }
        };

        Self {
            clients: RwLock::new(clients),
            store,
            allowed_redirect_uris,
        }
    }

    /// Register a new OAuth 2.0 client (RFC 7591).
    ///
    /// The registration is persisted synchronously before the response is
    /// returned, so a registration is never lost to a crash between register
    /// and first use.
    ///
    /// # Errors
    /// Returns `invalid_client_metadata` / `invalid_redirect_uri` on
    /// validation failure, or `server_error` if the registration cannot be
    /// persisted.
    pub async fn register(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        self.validate_registration_request(&request)?;

        let client_id = Self::generate_client_id();
        let grant_types = request
            .grant_types
            .unwrap_or_else(|| vec!["authorization_code".to_owned(), "refresh_token".to_owned()]);
        let response_types = request
            .response_types
            .unwrap_or_else(|| vec!["code".to_owned()]);
        let token_endpoint_auth_method = request
            .token_endpoint_auth_method
            .unwrap_or_else(|| "none".to_owned());
        let created_at = Utc::now();

        let client = OAuthClient {
            client_id: client_id.clone(),
            client_name: request.client_name,
            redirect_uris: request.redirect_uris,
            response_types,
            grant_types,
            token_endpoint_auth_method,
            client_id_issued_at: created_at,
        };

        {
            let mut clients = self.clients.write().await;
            clients.insert(client_id.clone(), client.clone());
            if let Err(e) = self.store.persist(&clients).await {
                // The caller is told registration failed, so the in-memory
                // entry must not survive either.
                clients.remove(&client_id);
                tracing::error!(error = %e, client_id = %client_id, "Failed to persist client registration");
                return Err(OAuth2Error::server_error(
                    "Failed to store client registration",
                ));
            }
        }

        tracing::info!(client_id = %client_id, client_name = %client.client_name, "Registered OAuth client");

        Ok(ClientRegistrationResponse {
            client_id,
            client_id_issued_at: created_at.timestamp(),
            client_name: client.client_name,
            redirect_uris: client.redirect_uris,
            grant_types: client.grant_types,
            response_types: client.response_types,
            token_endpoint_auth_method: client.token_endpoint_auth_method,
        })
    }

    /// Get a client by `client_id`
    pub async fn get_client(&self, client_id: &str) -> Option<OAuthClient> {
        self.clients.read().await.get(client_id).cloned()
    }

    /// Delete a client. Persists immediately on success.
    ///
    /// # Errors
    /// Returns a storage error if the deletion cannot be persisted.
    pub async fn delete_client(&self, client_id: &str) -> AppResult<bool> {
        let mut clients = self.clients.write().await;
        if clients.remove(client_id).is_none() {
            return Ok(false);
        }
        self.store.persist(&clients).await?;
        tracing::info!(client_id = %client_id, "Deleted OAuth client");
        Ok(true)
    }

    /// Check a redirect URI against a client's registered set.
    ///
    /// Matching is exact; no substring or prefix matching is ever permitted.
    /// The one relaxation: a client that registered at least one loopback
    /// URI may redirect to any loopback URI, so CLI-style clients can bind
    /// an ephemeral local port per run.
    pub async fn is_valid_redirect_uri(&self, client_id: &str, uri: &str) -> bool {
        let clients = self.clients.read().await;
        let Some(client) = clients.get(client_id) else {
            return false;
        };

        if client.redirect_uris.iter().any(|registered| registered == uri) {
            return true;
        }

        Self::is_loopback_uri(uri)
            && client
                .redirect_uris
                .iter()
                .any(|registered| Self::is_loopback_uri(registered))
    }

    /// Validate a registration request
    fn validate_registration_request(
        &self,
        request: &ClientRegistrationRequest,
    ) -> Result<(), OAuth2Error> {
        if request.client_name.trim().is_empty() {
            return Err(OAuth2Error::invalid_client_metadata(
                "client_name must not be empty",
            ));
        }

        if request.redirect_uris.is_empty() {
            return Err(OAuth2Error::invalid_redirect_uri(
                "At least one redirect_uri is required",
            ));
        }

        for uri in &request.redirect_uris {
            if !self.is_acceptable_redirect_uri(uri) {
                return Err(OAuth2Error::invalid_redirect_uri(&format!(
                    "Invalid redirect_uri: {uri}"
                )));
            }
        }

        if let Some(ref grant_types) = request.grant_types {
            for grant_type in grant_types {
                if !matches!(grant_type.as_str(), "authorization_code" | "refresh_token") {
                    return Err(OAuth2Error::invalid_client_metadata(&format!(
                        "Unsupported grant_type: {grant_type}"
                    )));
                }
            }
        }

        if let Some(ref response_types) = request.response_types {
            for response_type in response_types {
                if response_type != "code" {
                    return Err(OAuth2Error::invalid_client_metadata(&format!(
                        "Unsupported response_type: {response_type}"
                    )));
                }
            }
        }

        if let Some(ref method) = request.token_endpoint_auth_method {
            if method != "none" {
                return Err(OAuth2Error::invalid_client_metadata(&format!(
                    "Unsupported token_endpoint_auth_method: {method}"
                )));
            }
        }

        Ok(())
    }

    /// Decide whether a redirect URI may be registered.
    ///
    /// First-party callbacks are accepted unconditionally, loopback URIs are
    /// accepted to support CLI-style dynamic-port clients, everything else
    /// must appear on the server-side allow-list (or match its `"*"`
    /// development wildcard) and use HTTPS unless the host is literally
    /// `localhost`.
    fn is_acceptable_redirect_uri(&self, uri: &str) -> bool {
        if !Self::validate_uri_format(uri) {
            return false;
        }

        if FIRST_PARTY_REDIRECT_URIS.contains(&uri) {
            return true;
        }

        if Self::is_loopback_uri(uri) {
            return true;
        }

        let allow_listed = self
            .allowed_redirect_uris
            .iter()
            .any(|allowed| allowed == "*" || allowed == uri);
        if !allow_listed {
            tracing::warn!("Rejected redirect_uri not on the allow-list: {uri}");
            return false;
        }

        let Ok(parsed) = url::Url::parse(uri) else {
            tracing::warn!("Rejected malformed redirect_uri: {uri}");
            return false;
        };

        if parsed.scheme() == "https" || parsed.host_str() == Some("localhost") {
            return true;
        }

        tracing::warn!("Rejected redirect_uri with non-HTTPS scheme for non-localhost host: {uri}");
        false
    }

    /// Validate basic URI format requirements
    fn validate_uri_format(uri: &str) -> bool {
        if uri.trim().is_empty() {
            return false;
        }

        // Fragments are a security risk (RFC 6749 Section 3.1.2)
        if uri.contains('#') {
            tracing::warn!("Rejected redirect_uri with fragment: {uri}");
            return false;
        }

        // Wildcard patterns enable subdomain bypass attacks
        if uri.contains('*') {
            tracing::warn!("Rejected redirect_uri with wildcard: {uri}");
            return false;
        }

        true
    }

    /// Check whether a URI points at the local loopback
    fn is_loopback_uri(uri: &str) -> bool {
        let Ok(parsed) = url::Url::parse(uri) else {
            return false;
        };
        matches!(parsed.host_str(), Some("localhost" | "127.0.0.1"))
    }

    /// Generate an unguessable client identifier
    fn generate_client_id() -> String {
        format!("cadence_{}", Uuid::new_v4().simple())
    }
}
