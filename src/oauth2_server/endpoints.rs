// ABOUTME: OAuth 2.1 authorization and token endpoint orchestration
// ABOUTME: Ties together sessions, clients, one-time codes, PKCE and RS256 token minting
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

use super::client_registry::ClientRegistry;
use super::code_store::{AuthCodeStore, IssueCodeParams};
use super::models::{AuthorizeRequest, AuthorizeResponse, OAuth2Error, TokenRequest, TokenResponse};
use super::pkce;
use super::refresh_store::RefreshTokenStore;
use super::session_store::SessionStore;
use super::token_service::TokenService;
use std::sync::Arc;

/// OAuth 2.1 authorization server.
///
/// The host's HTTP layer calls [`Self::authorize`] from the authorization
/// endpoint and [`Self::token`] from the token endpoint; everything else is
/// internal wiring.
pub struct AuthorizationServer {
    registry: Arc<ClientRegistry>,
    codes: Arc<AuthCodeStore>,
    refresh_tokens: Arc<RefreshTokenStore>,
    sessions: Arc<SessionStore>,
    token_service: Arc<TokenService>,
    audience: String,
}

impl AuthorizationServer {
    /// Assemble the server from its collaborators. `audience` is stamped
    /// into the `aud` claim of every issued access token.
    #[must_use]
    pub fn new(
        registry: Arc<ClientRegistry>,
        codes: Arc<AuthCodeStore>,
        refresh_tokens: Arc<RefreshTokenStore>,
        sessions: Arc<SessionStore>,
        token_service: Arc<TokenService>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            codes,
            refresh_tokens,
            sessions,
            token_service,
            audience: audience.into(),
        }
    }

    /// Handle an authorization request (GET /oauth/authorize).
    ///
    /// `session_id` identifies the consent session established by the host's
    /// login flow; the authenticated user behind it becomes the code's
    /// subject.
    ///
    /// # Errors
    /// Returns an OAuth error if the session is missing/expired, the client
    /// is unknown, the redirect URI does not match, or the PKCE parameters
    /// are invalid.
    pub async fn authorize(
        &self,
        request: AuthorizeRequest,
        session_id: &str,
    ) -> Result<AuthorizeResponse, OAuth2Error> {
        let Some(session) = self.sessions.get_session(session_id).await else {
            tracing::warn!(client_id = %request.client_id, "Authorization attempted without a valid session");
            return Err(OAuth2Error::invalid_request("User authentication required"));
        };

        if self.registry.get_client(&request.client_id).await.is_none() {
            tracing::warn!(client_id = %request.client_id, "Authorization attempted for unknown client");
            return Err(OAuth2Error::invalid_client());
        }

        if request.response_type != "code" {
            return Err(OAuth2Error::invalid_request(
                "Only 'code' response_type is supported",
            ));
        }

        if !self
            .registry
            .is_valid_redirect_uri(&request.client_id, &request.redirect_uri)
            .await
        {
            return Err(OAuth2Error::invalid_redirect_uri(
                "redirect_uri does not match any registered redirect URI",
            ));
        }

        // PKCE is mandatory for the authorization code flow
        let Some(ref code_challenge) = request.code_challenge else {
            return Err(OAuth2Error::invalid_request(
                "code_challenge is required for authorization_code flow (PKCE)",
            ));
        };
        pkce::validate_challenge(code_challenge)?;

        let method = request.code_challenge_method.as_deref().unwrap_or("S256");
        if method != "S256" {
            return Err(OAuth2Error::invalid_request(
                "code_challenge_method must be 'S256' (plain method is not supported for security reasons)",
            ));
        }

        let code = self
            .codes
            .issue(IssueCodeParams {
                client_id: request.client_id.clone(),
                redirect_uri: request.redirect_uri.clone(),
                scope: request.scope.clone(),
                code_challenge: code_challenge.clone(),
                code_challenge_method: method.to_owned(),
                resource: request.resource.clone(),
                user_id: session.user_id,
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    client_id = %request.client_id,
                    error = %e,
                    "Failed to generate authorization code"
                );
                OAuth2Error::server_error("Failed to generate authorization code")
            })?;

        Ok(AuthorizeResponse {
            code,
            state: request.state,
        })
    }

    /// Handle a token request (POST /oauth/token).
    ///
    /// # Errors
    /// Returns an OAuth error if the client is unknown, the grant is
    /// invalid, or token minting fails.
    pub async fn token(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        // Registered clients are public PKCE clients
        // (token_endpoint_auth_method "none"); the verifier is the binding
        // credential at this endpoint, not a client secret.
        if self.registry.get_client(&request.client_id).await.is_none() {
            tracing::warn!(client_id = %request.client_id, "Token request from unknown client");
            return Err(OAuth2Error::invalid_client());
        }

        match request.grant_type.as_str() {
            "authorization_code" => self.handle_authorization_code_grant(request).await,
            "refresh_token" => self.handle_refresh_token_grant(request).await,
            _ => Err(OAuth2Error::unsupported_grant_type()),
        }
    }

    /// Handle the `authorization_code` grant
    async fn handle_authorization_code_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = request
            .code
            .ok_or_else(|| OAuth2Error::invalid_request("Missing authorization code"))?;
        let redirect_uri = request
            .redirect_uri
            .ok_or_else(|| OAuth2Error::invalid_request("Missing redirect_uri"))?;

        // Consume first, verify PKCE after: a failed verifier still burns
        // the code, so it cannot be retried with another guess.
        let auth_code = self.codes.consume(&code, &request.client_id).await?;

        if auth_code.redirect_uri != redirect_uri {
            tracing::warn!(client_id = %request.client_id, "redirect_uri mismatch at token endpoint");
            return Err(OAuth2Error::invalid_grant(
                "redirect_uri does not match the authorization request",
            ));
        }

        let verifier = request
            .code_verifier
            .ok_or_else(|| OAuth2Error::invalid_grant("code_verifier is required (PKCE)"))?;

        if !pkce::verify(
            &verifier,
            &auth_code.code_challenge,
            &auth_code.code_challenge_method,
        )? {
            tracing::warn!(
                client_id = %request.client_id,
                "PKCE verification failed - code_verifier does not match code_challenge"
            );
            return Err(OAuth2Error::invalid_grant("Invalid code_verifier"));
        }
        tracing::debug!(client_id = %request.client_id, "PKCE verification successful");

        let mut response = self
            .token_service
            .issue_access_token(
                &request.client_id,
                &auth_code.user_id,
                auth_code.scope.as_deref(),
                &self.audience,
            )
            .map_err(|e| {
                tracing::error!(client_id = %request.client_id, error = %e, "Failed to generate access token");
                OAuth2Error::server_error("Failed to generate access token")
            })?;

        let refresh_token = self
            .refresh_tokens
            .issue(
                &request.client_id,
                &auth_code.user_id,
                auth_code.scope.as_deref(),
            )
            .await
            .map_err(|e| {
                tracing::error!(client_id = %request.client_id, error = %e, "Failed to generate refresh token");
                OAuth2Error::server_error("Failed to generate refresh token")
            })?;

        response.refresh_token = Some(refresh_token);
        Ok(response)
    }

    /// Handle the `refresh_token` grant with rotation
    async fn handle_refresh_token_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let refresh_token_value = request
            .refresh_token
            .ok_or_else(|| OAuth2Error::invalid_request("Missing refresh_token"))?;

        // Atomically consume the presented token; it is revoked even if the
        // rest of this handler fails
        let old_token = self
            .refresh_tokens
            .consume(&refresh_token_value, &request.client_id)
            .await?;

        let mut response = self
            .token_service
            .issue_access_token(
                &request.client_id,
                &old_token.user_id,
                old_token.scope.as_deref(),
                &self.audience,
            )
            .map_err(|e| {
                tracing::error!(client_id = %request.client_id, error = %e, "Failed to generate access token from refresh");
                OAuth2Error::server_error("Failed to generate access token")
            })?;

        let new_refresh_token = self
            .refresh_tokens
            .issue(
                &request.client_id,
                &old_token.user_id,
                old_token.scope.as_deref(),
            )
            .await
            .map_err(|e| {
                tracing::error!(client_id = %request.client_id, error = %e, "Failed to rotate refresh token");
                OAuth2Error::server_error("Failed to generate refresh token")
            })?;

        tracing::info!(
            client_id = %request.client_id,
            user_id = %old_token.user_id,
            "Refresh token rotated"
        );

        response.scope = old_token.scope;
        response.refresh_token = Some(new_refresh_token);
        Ok(response)
    }
}
