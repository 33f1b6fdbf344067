// ABOUTME: Single-use refresh token store with rotation on every redemption
// ABOUTME: A consumed token is revoked atomically so a stolen token dies at first reuse
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

use super::models::{OAuth2Error, RefreshToken};
use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Store of opaque single-use refresh tokens.
///
/// Refresh tokens are held in memory only: losing them on restart forces
/// clients through a fresh authorization, which is the accepted trade-off
/// for a single-process server.
pub struct RefreshTokenStore {
    tokens: RwLock<HashMap<String, RefreshToken>>,
    ttl: Duration,
}

impl RefreshTokenStore {
    /// Create a store whose tokens live for `ttl_secs` seconds
    #[must_use]
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Issue a new refresh token for a client/user pair.
    ///
    /// # Errors
    /// Returns a crypto error if the system RNG fails.
    pub async fn issue(
        &self,
        client_id: &str,
        user_id: &str,
        scope: Option<&str>,
    ) -> AppResult<String> {
        let token = Self::generate_token()?;
        let created_at = Utc::now();

        let record = RefreshToken {
            token: token.clone(),
            client_id: client_id.to_owned(),
            user_id: user_id.to_owned(),
            scope: scope.map(str::to_owned),
            expires_at: created_at + self.ttl,
            created_at,
            revoked: false,
        };

        self.tokens.write().await.insert(token.clone(), record);
        Ok(token)
    }

    /// Validate a refresh token and atomically revoke it (rotation).
    ///
    /// # Errors
    /// Returns `invalid_grant` if the token is unknown, revoked, expired or
    /// bound to a different client.
    pub async fn consume(
        &self,
        token: &str,
        client_id: &str,
    ) -> Result<RefreshToken, OAuth2Error> {
        let mut tokens = self.tokens.write().await;

        let Some(entry) = tokens.get_mut(token) else {
            tracing::warn!(client_id = %client_id, "Refresh token not found");
            return Err(OAuth2Error::invalid_grant("Invalid or expired refresh token"));
        };

        if entry.revoked || entry.expires_at <= Utc::now() || entry.client_id != client_id {
            tracing::warn!(
                client_id = %client_id,
                "Refresh token revoked, expired or bound to a different client"
            );
            return Err(OAuth2Error::invalid_grant("Invalid or expired refresh token"));
        }

        entry.revoked = true;
        Ok(entry.clone())
    }

    /// Delete every revoked or expired entry. Returns the number removed.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, entry| !entry.revoked && entry.expires_at > now);
        before - tokens.len()
    }

    /// Generate a high-entropy refresh token value
    fn generate_token() -> AppResult<String> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes).map_err(|e| {
            tracing::error!("CRITICAL: SystemRandom failed - cannot generate refresh token: {e:?}");
            AppError::crypto("System RNG failure - cannot generate refresh token")
        })?;
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }
}
