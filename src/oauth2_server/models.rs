// ABOUTME: OAuth 2.0 data models for client registration, codes, sessions and token exchange
// ABOUTME: Implements RFC 7591 and OAuth 2.0 request/response structures plus the error taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Cadence Works

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth 2.0 Client Registration Request (RFC 7591)
#[derive(Debug, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Client name for display
    pub client_name: String,
    /// Redirect URIs for authorization code flow
    pub redirect_uris: Vec<String>,
    /// Grant types the client can use
    pub grant_types: Option<Vec<String>>,
    /// Response types the client can use
    pub response_types: Option<Vec<String>>,
    /// Token endpoint authentication method
    pub token_endpoint_auth_method: Option<String>,
}

/// OAuth 2.0 Client Registration Response (RFC 7591)
#[derive(Debug, Serialize)]
pub struct ClientRegistrationResponse {
    /// Unique client identifier
    pub client_id: String,
    /// When the client identifier was issued (unix seconds)
    pub client_id_issued_at: i64,
    /// Client name
    pub client_name: String,
    /// Redirect URIs registered for this client
    pub redirect_uris: Vec<String>,
    /// Grant types allowed for this client
    pub grant_types: Vec<String>,
    /// Response types allowed for this client
    pub response_types: Vec<String>,
    /// Token endpoint authentication method
    pub token_endpoint_auth_method: String,
}

/// A registered OAuth 2.0 client
///
/// Once issued, `client_id` and `redirect_uris` are authoritative for
/// exact-match comparison at every later authorization/token step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Opaque server-generated client identifier, immutable
    pub client_id: String,
    /// Client name for display
    pub client_name: String,
    /// Registered redirect URIs
    pub redirect_uris: Vec<String>,
    /// Response types allowed for this client
    pub response_types: Vec<String>,
    /// Grant types allowed for this client
    pub grant_types: Vec<String>,
    /// Token endpoint authentication method
    pub token_endpoint_auth_method: String,
    /// When the client identifier was issued
    pub client_id_issued_at: DateTime<Utc>,
}

/// OAuth 2.0 Authorization Request
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    /// Response type (only `code` is supported)
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI for the response
    pub redirect_uri: String,
    /// Requested scopes
    pub scope: Option<String>,
    /// State parameter for client-side CSRF protection (echoed unchanged)
    pub state: Option<String>,
    /// PKCE code challenge (RFC 7636, required)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (only S256 is supported)
    pub code_challenge_method: Option<String>,
    /// Target resource indicator (RFC 8707)
    pub resource: Option<String>,
}

/// OAuth 2.0 Authorization Response
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    /// Authorization code
    pub code: String,
    /// State parameter (if provided in the request)
    pub state: Option<String>,
}

/// OAuth 2.0 Token Request
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// Grant type (`authorization_code` or `refresh_token`)
    pub grant_type: String,
    /// Client ID
    pub client_id: String,
    /// Authorization code (for `authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI (must match the one bound to the code)
    pub redirect_uri: Option<String>,
    /// PKCE code verifier (RFC 7636, for `authorization_code` grant)
    pub code_verifier: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Access token (RS256 JWT)
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Seconds until the access token expires
    pub expires_in: i64,
    /// Scopes granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Refresh token (rotated on every use)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// A one-time authorization code and everything bound to it
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// The code value (cryptographically random, single use)
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Redirect URI the code is bound to
    pub redirect_uri: String,
    /// Scopes granted at the authorization step
    pub scope: Option<String>,
    /// PKCE challenge the redeeming verifier must match
    pub code_challenge: String,
    /// PKCE challenge method (always S256)
    pub code_challenge_method: String,
    /// Target resource indicator, if requested
    pub resource: Option<String>,
    /// User who approved the authorization
    pub user_id: String,
    /// When the code was issued
    pub created_at: DateTime<Utc>,
    /// When the code becomes unusable
    pub expires_at: DateTime<Utc>,
    /// Transitions false -> true exactly once; any second redemption fails closed
    pub used: bool,
}

/// An authenticated-user session bridging the consent UI to code issuance
#[derive(Debug, Clone)]
pub struct UserSession {
    /// Random high-entropy session identifier
    pub session_id: String,
    /// User the session belongs to
    pub user_id: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session expires (fixed 24 hour window)
    pub expires_at: DateTime<Utc>,
}

/// A single-use refresh token record
#[derive(Debug, Clone)]
pub struct RefreshToken {
    /// The refresh token value
    pub token: String,
    /// Client that owns this token
    pub client_id: String,
    /// User the token was issued for
    pub user_id: String,
    /// Scopes carried over from the original grant
    pub scope: Option<String>,
    /// When this token expires
    pub expires_at: DateTime<Utc>,
    /// When this token was created
    pub created_at: DateTime<Utc>,
    /// Set when the token is consumed during rotation
    pub revoked: bool,
}

/// OAuth 2.0 Error Response
#[derive(Debug, Clone, Serialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    pub error_description: Option<String>,
    /// URI for error information
    pub error_uri: Option<String>,
}

impl OAuth2Error {
    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self {
            error: "invalid_request".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create an `invalid_client_metadata` error (RFC 7591 Section 3.2.2)
    #[must_use]
    pub fn invalid_client_metadata(description: &str) -> Self {
        Self {
            error: "invalid_client_metadata".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc7591#section-3.2.2".to_owned(),
            ),
        }
    }

    /// Create an `invalid_redirect_uri` error (RFC 7591 Section 3.2.2)
    #[must_use]
    pub fn invalid_redirect_uri(description: &str) -> Self {
        Self {
            error: "invalid_redirect_uri".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc7591#section-3.2.2".to_owned(),
            ),
        }
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self {
            error: "invalid_client".to_owned(),
            error_description: Some("Client authentication failed".to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self {
            error: "invalid_grant".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `invalid_token` error (RFC 6750 Section 3.1)
    #[must_use]
    pub fn invalid_token(description: &str) -> Self {
        Self {
            error: "invalid_token".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6750#section-3.1".to_owned()),
        }
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self {
            error: "unsupported_grant_type".to_owned(),
            error_description: Some("Grant type not supported".to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create a `server_error` error
    #[must_use]
    pub fn server_error(description: &str) -> Self {
        Self {
            error: "server_error".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }
}

impl std::fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuth2Error {}
