// ABOUTME: Upstream callback handler completing the outbound OAuth exchange
// ABOUTME: Maps the provider redirect to typed outcomes and renders minimal HTML responses
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

use super::pending::PendingAuthStore;
use super::{TokenStorage, UpstreamProvider};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Query parameters of the provider's redirect back to us
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code issued by the provider
    pub code: Option<String>,
    /// CSRF state minted when the flow was initiated
    pub state: Option<String>,
    /// Error code, if the provider rejected the authorization
    pub error: Option<String>,
    /// Human-readable error description from the provider
    pub error_description: Option<String>,
}

/// Outcome of handling an upstream callback
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// Tokens obtained and handed to storage; the pending entry is gone
    Connected,
    /// The provider reported an error (user declined, or a provider fault)
    Denied {
        /// User-facing message
        message: String,
    },
    /// The callback carried no `state` parameter
    SessionNotFound,
    /// The callback carried no `code` parameter
    CodeMissing,
    /// No pending entry matched the state (unknown or expired)
    SessionExpired,
    /// The token exchange or the storage handoff failed; the pending entry
    /// stays alive so the flow can be retried within its TTL
    ExchangeFailed {
        /// User-facing message
        message: String,
    },
}

impl CallbackOutcome {
    /// Whether the flow completed successfully
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// User-facing message for this outcome
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Connected => "Your calendar is now connected. You can close this window.".to_owned(),
            Self::Denied { message } | Self::ExchangeFailed { message } => message.clone(),
            Self::SessionNotFound => {
                "Authorization session not found. Please restart the connection from the assistant.".to_owned()
            }
            Self::CodeMissing => {
                "The calendar provider did not return an authorization code. Please try again.".to_owned()
            }
            Self::SessionExpired => {
                "This authorization session has expired. Please restart the connection from the assistant.".to_owned()
            }
        }
    }

    /// Render this outcome as a minimal HTML page
    #[must_use]
    pub fn to_html(&self, provider: &str) -> String {
        if self.is_success() {
            OAuthTemplateRenderer::render_success_template(provider)
        } else {
            OAuthTemplateRenderer::render_error_template(provider, &self.message())
        }
    }
}

/// Orchestrates the outbound flow completion when the provider redirects back
pub struct CallbackHandler {
    pending: Arc<PendingAuthStore>,
    provider: Arc<dyn UpstreamProvider>,
    storage: Arc<dyn TokenStorage>,
}

impl CallbackHandler {
    /// Create a handler over the pending store, provider and token storage
    #[must_use]
    pub fn new(
        pending: Arc<PendingAuthStore>,
        provider: Arc<dyn UpstreamProvider>,
        storage: Arc<dyn TokenStorage>,
    ) -> Self {
        Self {
            pending,
            provider,
            storage,
        }
    }

    /// Handle the provider's redirect.
    ///
    /// The pending entry is removed only after both the token exchange and
    /// the storage handoff succeed, so a transient failure leaves the
    /// session intact for a retry within its TTL.
    pub async fn handle_callback(&self, query: &CallbackQuery) -> CallbackOutcome {
        if let Some(error_code) = &query.error {
            warn!(provider = %self.provider.name(), error = %error_code, "Provider rejected the authorization");
            let message = if error_code == "access_denied" {
                "You declined calendar access. You can reconnect from the assistant whenever you're ready.".to_owned()
            } else {
                query.error_description.as_ref().map_or_else(
                    || format!("The calendar provider reported an error: {error_code}"),
                    |description| {
                        format!("The calendar provider reported an error: {error_code} ({description})")
                    },
                )
            };
            return CallbackOutcome::Denied { message };
        }

        // Both missing-parameter outcomes surface without touching the
        // pending store
        let Some(state) = &query.state else {
            warn!(provider = %self.provider.name(), "Callback missing state parameter");
            return CallbackOutcome::SessionNotFound;
        };
        let Some(code) = &query.code else {
            warn!(provider = %self.provider.name(), "Callback missing code parameter");
            return CallbackOutcome::CodeMissing;
        };

        let Some(pending) = self.pending.find_by_state(state).await else {
            warn!(provider = %self.provider.name(), "No pending entry for callback state (unknown or expired)");
            return CallbackOutcome::SessionExpired;
        };

        let tokens = match self
            .provider
            .exchange_code(code, &pending.code_verifier, &pending.redirect_uri)
            .await
        {
            Ok(tokens) => tokens,
            Err(e) => {
                error!(provider = %self.provider.name(), error = %e, "Token exchange failed");
                return CallbackOutcome::ExchangeFailed {
                    message: "Connecting your calendar failed. Please try again.".to_owned(),
                };
            }
        };

        if let Err(e) = self.storage.store_tokens(&tokens).await {
            error!(provider = %self.provider.name(), error = %e, "Failed to store upstream tokens");
            return CallbackOutcome::ExchangeFailed {
                message: "Connecting your calendar failed. Please try again.".to_owned(),
            };
        }

        self.pending.remove(state).await;
        info!(provider = %self.provider.name(), "Upstream calendar connected");
        CallbackOutcome::Connected
    }
}

/// Template renderer for the callback's success and error pages
pub struct OAuthTemplateRenderer;

impl OAuthTemplateRenderer {
    /// Render the success page
    #[must_use]
    pub fn render_success_template(provider: &str) -> String {
        const TEMPLATE: &str = include_str!("../../templates/oauth_success.html");

        TEMPLATE.replace("{{PROVIDER}}", &html_escape::encode_text(provider))
    }

    /// Render the error page. `message` may contain provider-supplied text
    /// and is escaped before interpolation.
    #[must_use]
    pub fn render_error_template(provider: &str, message: &str) -> String {
        const TEMPLATE: &str = include_str!("../../templates/oauth_error.html");

        TEMPLATE
            .replace("{{PROVIDER}}", &html_escape::encode_text(provider))
            .replace("{{MESSAGE}}", &html_escape::encode_text(message))
    }
}
