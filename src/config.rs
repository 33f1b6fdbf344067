// ABOUTME: Configuration types consumed from the host's config subsystem
// ABOUTME: Covers issuer identity, RSA key material, TTL strings, redirect allow-lists and scopes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Cadence Works

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::env;
use tracing::warn;

/// Default lifetime of a signed access token
pub const DEFAULT_ACCESS_TOKEN_TTL: &str = "1h";

/// Default lifetime of a refresh token
pub const DEFAULT_REFRESH_TOKEN_TTL: &str = "30d";

/// Default lifetime of an authorization code
pub const DEFAULT_AUTH_CODE_TTL: &str = "10m";

/// Default lifetime of a pending upstream-auth entry
pub const DEFAULT_PENDING_AUTH_TTL: &str = "10m";

/// Consent sessions live for a fixed 24 hour window
pub const SESSION_EXPIRY_HOURS: i64 = 24;

/// Interval between authorization-code sweep runs
pub const CODE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Interval between pending upstream-auth sweep runs
pub const PENDING_SWEEP_INTERVAL_SECS: u64 = 300;

/// Parse a human duration string (`"45s"`, `"10m"`, `"1h"`, `"30d"`, `"2w"`)
/// into seconds.
///
/// Unit suffixes map as `s=1`, `m=60`, `h=3600`, `d=86400`, `w=604800`.
/// Unknown formats are a configuration error; callers are expected to fail
/// at construction time, not at issuance time.
///
/// # Errors
/// Returns a config error if the string is empty, the suffix is unknown, or
/// the magnitude is not a positive integer.
pub fn parse_ttl(value: &str) -> AppResult<i64> {
    let value = value.trim();
    let Some(unit) = value.chars().last() else {
        return Err(AppError::config("duration string is empty"));
    };

    let multiplier: i64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 604_800,
        _ => {
            return Err(AppError::config(format!(
                "unknown duration unit '{unit}' in '{value}' (expected one of s, m, h, d, w)"
            )))
        }
    };

    let magnitude = &value[..value.len() - 1];
    let amount: i64 = magnitude.parse().map_err(|_| {
        AppError::config(format!("invalid duration magnitude '{magnitude}' in '{value}'"))
    })?;

    if amount < 0 {
        return Err(AppError::config(format!(
            "duration '{value}' must not be negative"
        )));
    }

    Ok(amount * multiplier)
}

/// Configuration for the authorization server side of the subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Issuer string stamped into (and required from) every JWT
    pub issuer: String,
    /// RSA private key, PKCS8 PEM
    pub private_key_pem: String,
    /// RSA public key, SPKI PEM
    pub public_key_pem: String,
    /// Access token lifetime as a human duration string
    pub access_token_ttl: String,
    /// Refresh token lifetime as a human duration string
    pub refresh_token_ttl: String,
    /// Authorization code lifetime as a human duration string
    pub auth_code_ttl: String,
    /// Server-side redirect URI allow-list; the single entry `"*"` allows
    /// everything (development only)
    pub allowed_redirect_uris: Vec<String>,
    /// Human-readable description per scope, consumed by the host's consent UI
    pub scope_descriptions: HashMap<String, String>,
}

impl AuthConfig {
    /// Scope descriptions shipped by default for the Cadence scopes
    #[must_use]
    pub fn default_scope_descriptions() -> HashMap<String, String> {
        [
            ("calendar:read", "Read your calendar events"),
            ("calendar:write", "Create and update calendar events"),
            ("tasks:read", "Read your task list"),
            ("tasks:write", "Create and update tasks"),
            ("profile:read", "Read your profile information"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
    }
}

/// Configuration for the outbound Google Calendar OAuth client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth client ID issued by the Google Cloud console
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Callback URI registered with Google
    pub redirect_uri: String,
    /// Authorization endpoint
    pub auth_endpoint: String,
    /// Token endpoint
    pub token_endpoint: String,
    /// Scopes requested for delegated calendar access
    pub scopes: Vec<String>,
}

impl GoogleConfig {
    /// Load the Google client configuration from the environment.
    ///
    /// # Errors
    /// Returns a config error if `GOOGLE_CLIENT_ID` or
    /// `GOOGLE_CLIENT_SECRET` is not set.
    pub fn from_env() -> AppResult<Self> {
        let client_id = env::var("GOOGLE_CLIENT_ID")
            .map_err(|_| AppError::config("GOOGLE_CLIENT_ID not set"))?;
        let client_secret = env::var("GOOGLE_CLIENT_SECRET")
            .map_err(|_| AppError::config("GOOGLE_CLIENT_SECRET not set"))?;
        let redirect_uri = env::var("GOOGLE_REDIRECT_URI")
            .unwrap_or_else(|_| "http://localhost:8081/oauth/google/callback".to_owned());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            auth_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_owned(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_owned(),
            scopes: vec![
                "https://www.googleapis.com/auth/calendar".to_owned(),
                "https://www.googleapis.com/auth/calendar.events".to_owned(),
            ],
        })
    }

    /// Compute a SHA256 fingerprint of the client secret (first 8 hex chars).
    /// Allows comparing secrets in diagnostics without logging actual values.
    #[must_use]
    pub fn secret_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.client_secret.as_bytes());
        let digest = hasher.finalize();
        format!("{digest:x}").chars().take(8).collect()
    }

    /// Validate the credentials and log diagnostics.
    /// Returns true if the credentials appear usable.
    pub fn validate_and_log(&self) -> bool {
        if self.client_id.is_empty() {
            warn!("Google OAuth client_id is empty");
            return false;
        }
        if self.client_secret.is_empty() {
            warn!("Google OAuth client_secret is empty");
            return false;
        }
        tracing::debug!(
            client_id_len = self.client_id.len(),
            secret_fingerprint = %self.secret_fingerprint(),
            redirect_uri = %self.redirect_uri,
            "Google OAuth credentials loaded"
        );
        true
    }
}
