// ABOUTME: Google Calendar OAuth provider implementation for delegated calendar access
// ABOUTME: Builds consent URLs and exchanges authorization codes at the Google token endpoint
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

use super::{UpstreamError, UpstreamProvider, UpstreamTokens};
use crate::config::GoogleConfig;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Timeout on the outbound token exchange; this is the only cancellation
/// surface for the exchange and its expiry is an ordinary error outcome.
const EXCHANGE_TIMEOUT_SECS: u64 = 30;

/// Google Calendar OAuth provider
pub struct GoogleCalendarProvider {
    config: GoogleConfig,
    http: reqwest::Client,
}

/// Google token response format
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    /// Only present when offline access was granted
    refresh_token: Option<String>,
    expires_in: i64,
    scope: Option<String>,
}

impl GoogleCalendarProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    /// Returns an internal error if the HTTP client cannot be built.
    pub fn new(config: GoogleConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(EXCHANGE_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    /// Create a provider from `GOOGLE_*` environment variables.
    ///
    /// # Errors
    /// Returns a config error if required variables are missing.
    pub fn from_env() -> AppResult<Self> {
        let config = GoogleConfig::from_env()?;
        config.validate_and_log();
        Self::new(config)
    }
}

#[async_trait]
impl UpstreamProvider for GoogleCalendarProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str, code_challenge: &str, redirect_uri: &str) -> String {
        let scope = self.config.scopes.join(" ");

        // access_type=offline + prompt=consent: Google only grants a
        // refresh token for offline requests, and the exchange requires one
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
            self.config.auth_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<UpstreamTokens, UpstreamError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| UpstreamError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| UpstreamError::TokenExchangeFailed(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = %status, "Google token endpoint rejected the exchange");
            return Err(UpstreamError::TokenExchangeFailed(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let token_response: GoogleTokenResponse = serde_json::from_str(&response_text)
            .map_err(|e| UpstreamError::TokenExchangeFailed(format!("Parse error: {e}")))?;

        let refresh_token = token_response
            .refresh_token
            .ok_or(UpstreamError::MissingRefreshToken)?;

        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(token_response.expires_in);

        Ok(UpstreamTokens {
            access_token: token_response.access_token,
            refresh_token,
            expires_at,
            scopes: token_response
                .scope
                .unwrap_or_else(|| self.config.scopes.join(" ")),
            provider: "google".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GoogleConfig {
        GoogleConfig {
            client_id: "google-client-id".to_owned(),
            client_secret: "google-client-secret".to_owned(),
            redirect_uri: "http://localhost:8081/oauth/google/callback".to_owned(),
            auth_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_owned(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_owned(),
            scopes: vec!["https://www.googleapis.com/auth/calendar".to_owned()],
        }
    }

    #[test]
    fn test_authorization_url_carries_pkce_and_offline_access() {
        let provider = GoogleCalendarProvider::new(test_config()).unwrap();
        let url = provider.authorization_url(
            "state-123",
            "challenge-abc",
            "http://localhost:8081/oauth/google/callback",
        );

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=google-client-id"));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("code_challenge=challenge-abc"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8081%2Foauth%2Fgoogle%2Fcallback"));
        // The client secret never appears in the user-facing URL
        assert!(!url.contains("google-client-secret"));
    }
}
