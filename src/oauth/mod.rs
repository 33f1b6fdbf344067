// ABOUTME: Outbound OAuth module for delegated access to the upstream calendar provider
// ABOUTME: Centralizes pending-auth state, the provider client and callback orchestration
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

//! # Upstream OAuth
//!
//! Cadence acts as an OAuth *client* toward the upstream calendar provider:
//! it creates a CSRF-bound pending entry, sends the user off to consent,
//! and completes the exchange when the provider redirects back.

pub mod callback;
pub mod pending;
pub mod provider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use callback::{CallbackHandler, CallbackOutcome, CallbackQuery, OAuthTemplateRenderer};
pub use pending::{CreatedPendingAuth, PendingAuth, PendingAuthStore};
pub use provider::GoogleCalendarProvider;

/// Delegated token set obtained from the upstream provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamTokens {
    /// Short-lived upstream access token
    pub access_token: String,
    /// Long-lived upstream refresh token (required - the exchange fails without one)
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Space-separated scopes the provider granted
    pub scopes: String,
    /// Provider name the tokens belong to
    pub provider: String,
}

/// Upstream OAuth error types
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The token exchange with the provider failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// The provider's response lacked a refresh token
    #[error("Provider response did not include a refresh token")]
    MissingRefreshToken,

    /// Provider configuration is missing or invalid
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The token-storage collaborator failed
    #[error("Token storage error: {0}")]
    StorageError(String),
}

/// Trait for upstream OAuth provider implementations
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Provider name ("google")
    fn name(&self) -> &str;

    /// Build the provider's authorization URL for a pending entry
    fn authorization_url(&self, state: &str, code_challenge: &str, redirect_uri: &str) -> String;

    /// Exchange an authorization code for upstream tokens.
    ///
    /// `code_verifier` and `redirect_uri` must be sent back to the provider
    /// verbatim as stored at flow start (RFC 6749 + PKCE).
    ///
    /// # Errors
    /// Returns an error if the HTTP call fails, the response cannot be
    /// parsed, or no refresh token was granted.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<UpstreamTokens, UpstreamError>;
}

/// Collaborator that durably stores the delegated token set.
///
/// Owned by the host application (it knows about users and its own token
/// vault); the callback handler only hands tokens across this seam.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Persist a freshly obtained token set.
    ///
    /// # Errors
    /// Returns a storage error if the tokens cannot be saved; the callback
    /// handler keeps the pending entry alive so the flow can be retried.
    async fn store_tokens(&self, tokens: &UpstreamTokens) -> Result<(), UpstreamError>;
}
