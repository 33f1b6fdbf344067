// ABOUTME: OAuth 2.1 authorization server implementation with RS256 JWT access tokens
// ABOUTME: Provides RFC 7591 client registration, PKCE-bound codes and token endpoints for MCP clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Cadence Works

/// Registered client storage with pluggable persistence
pub mod client_registry;
/// One-time authorization code issuance and consumption
pub mod code_store;
/// OAuth 2.1 authorization and token endpoint orchestration
pub mod endpoints;
/// OAuth 2.0 data models and request/response types
pub mod models;
/// PKCE verifier/challenge primitives (RFC 7636)
pub mod pkce;
/// Single-use refresh tokens with rotation
pub mod refresh_store;
/// Short-lived consent sessions
pub mod session_store;
/// RS256 access token issuance and verification
pub mod token_service;

pub use client_registry::{ClientRegistry, ClientStore, EncryptedFileClientStore, MemoryClientStore};
pub use code_store::{AuthCodeStore, IssueCodeParams};
pub use endpoints::AuthorizationServer;
pub use models::{
    AuthorizationCode, AuthorizeRequest, AuthorizeResponse, ClientRegistrationRequest,
    ClientRegistrationResponse, OAuth2Error, OAuthClient, RefreshToken, TokenRequest,
    TokenResponse, UserSession,
};
pub use refresh_store::RefreshTokenStore;
pub use session_store::SessionStore;
pub use token_service::{AccessTokenClaims, TokenService, TokenValidationError};
