// ABOUTME: One-time authorization code store with TTL expiry and atomic consumption
// ABOUTME: Codes are bound to client, redirect URI and PKCE challenge; redemption is single use
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

use super::models::{AuthorizationCode, OAuth2Error};
use crate::errors::{AppError, AppResult};
use crate::lifecycle::PeriodicTask;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Parameters recorded when an authorization code is issued
#[derive(Debug, Clone)]
pub struct IssueCodeParams {
    /// Client the code is issued to
    pub client_id: String,
    /// Redirect URI the code is bound to
    pub redirect_uri: String,
    /// Scopes granted at the authorization step
    pub scope: Option<String>,
    /// PKCE challenge (S256)
    pub code_challenge: String,
    /// PKCE challenge method
    pub code_challenge_method: String,
    /// Target resource indicator, if requested
    pub resource: Option<String>,
    /// User who approved the authorization
    pub user_id: String,
}

/// Store of short-lived one-time authorization codes.
///
/// Consumption is a single critical section: two concurrent redemption
/// attempts for the same code can never both succeed.
pub struct AuthCodeStore {
    codes: RwLock<HashMap<String, AuthorizationCode>>,
    ttl: Duration,
}

impl AuthCodeStore {
    /// Create a store whose codes live for `ttl_secs` seconds
    #[must_use]
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Issue a new authorization code.
    ///
    /// # Errors
    /// Returns a crypto error if the system RNG fails.
    pub async fn issue(&self, params: IssueCodeParams) -> AppResult<String> {
        let code = Self::generate_code()?;
        let created_at = Utc::now();

        let auth_code = AuthorizationCode {
            code: code.clone(),
            client_id: params.client_id,
            redirect_uri: params.redirect_uri,
            scope: params.scope,
            code_challenge: params.code_challenge,
            code_challenge_method: params.code_challenge_method,
            resource: params.resource,
            user_id: params.user_id,
            created_at,
            expires_at: created_at + self.ttl,
            used: false,
        };

        self.codes.write().await.insert(code.clone(), auth_code);
        Ok(code)
    }

    /// Validate a code without consuming it.
    ///
    /// Expired codes are deleted as a side effect of the failed validation
    /// rather than waiting for the sweep.
    ///
    /// # Errors
    /// Returns `invalid_grant` if the code is unknown, already used, expired
    /// or bound to a different client.
    pub async fn validate(
        &self,
        code: &str,
        client_id: &str,
    ) -> Result<AuthorizationCode, OAuth2Error> {
        let mut codes = self.codes.write().await;
        Self::check_entry(&mut codes, code, client_id, false)
    }

    /// Validate a code and atomically mark it used.
    ///
    /// # Errors
    /// Returns `invalid_grant` if the code is unknown, already used, expired
    /// or bound to a different client.
    pub async fn consume(
        &self,
        code: &str,
        client_id: &str,
    ) -> Result<AuthorizationCode, OAuth2Error> {
        let mut codes = self.codes.write().await;
        Self::check_entry(&mut codes, code, client_id, true)
    }

    /// Unconditionally delete a code (explicit cancellation path).
    /// Returns whether the code existed.
    pub async fn revoke(&self, code: &str) -> bool {
        self.codes.write().await.remove(code).is_some()
    }

    /// Delete every expired or already-used entry. Returns the number of
    /// entries removed, for observability.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, entry| !entry.used && entry.expires_at > now);
        before - codes.len()
    }

    /// Spawn the fixed-interval sweep task. Dropping the returned guard
    /// cancels the sweep.
    #[must_use]
    pub fn spawn_sweeper(store: Arc<Self>, period: std::time::Duration) -> PeriodicTask {
        PeriodicTask::spawn("auth-code-sweep", period, move || {
            let store = Arc::clone(&store);
            async move {
                let removed = store.sweep().await;
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired/used authorization codes");
                }
            }
        })
    }

    /// Check a code under an already-held write lock, optionally flipping
    /// `used`. Doing both in one critical section is what makes consumption
    /// atomic.
    fn check_entry(
        codes: &mut HashMap<String, AuthorizationCode>,
        code: &str,
        client_id: &str,
        mark_used: bool,
    ) -> Result<AuthorizationCode, OAuth2Error> {
        let Some(entry) = codes.get_mut(code) else {
            tracing::warn!(client_id = %client_id, "Authorization code not found");
            return Err(OAuth2Error::invalid_grant(
                "Invalid or expired authorization code",
            ));
        };

        if entry.expires_at <= Utc::now() {
            codes.remove(code);
            tracing::warn!(client_id = %client_id, "Authorization code expired, removing");
            return Err(OAuth2Error::invalid_grant(
                "Invalid or expired authorization code",
            ));
        }

        if entry.used {
            tracing::warn!(client_id = %client_id, "Authorization code already used");
            return Err(OAuth2Error::invalid_grant(
                "Invalid or expired authorization code",
            ));
        }

        if entry.client_id != client_id {
            tracing::warn!(client_id = %client_id, "Authorization code bound to a different client");
            return Err(OAuth2Error::invalid_grant(
                "Invalid or expired authorization code",
            ));
        }

        if mark_used {
            entry.used = true;
        }

        Ok(entry.clone())
    }

    /// Generate a high-entropy code value
    fn generate_code() -> AppResult<String> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes).map_err(|e| {
            tracing::error!("CRITICAL: SystemRandom failed - cannot generate authorization code: {e:?}");
            AppError::crypto("System RNG failure - cannot generate authorization code")
        })?;
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }
}
