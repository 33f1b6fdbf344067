// ABOUTME: Main library entry point for the Cadence credential and token lifecycle subsystem
// ABOUTME: Provides the OAuth 2.1 authorization server and the upstream calendar OAuth client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Cadence Works

#![deny(unsafe_code)]

//! # Cadence Auth
//!
//! The credential and token lifecycle subsystem of the Cadence assistant.
//! Cadence itself is an MCP-based calendar/task assistant; this crate is the
//! only part of it that implements a security protocol from first principles
//! rather than orchestrating third-party APIs.
//!
//! ## Features
//!
//! - **Dynamic client registration**: RFC 7591 registration for MCP clients
//! - **Authorization code flow with PKCE**: S256-only, single-use codes
//! - **RS256 access tokens**: self-verifying JWTs, no server-side lookup
//! - **Refresh token rotation**: single-use refresh tokens, rotated on use
//! - **Upstream calendar delegation**: outbound OAuth client toward Google
//!   Calendar with CSRF-bound pending sessions and encrypted persistence
//!
//! ## Architecture
//!
//! The host application owns HTTP routing, transports and configuration
//! loading; it calls into this crate at three seams:
//! - [`oauth2_server::AuthorizationServer`] for the inbound authorization
//!   and token endpoints
//! - [`oauth2_server::ClientRegistry`] for the registration endpoint
//! - [`oauth::CallbackHandler`] for the upstream provider's redirect
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_auth::crypto::keys::generate_rsa_key_pair_pem;
//! use cadence_auth::oauth2_server::TokenService;
//!
//! # fn main() -> anyhow::Result<()> {
//! let keys = generate_rsa_key_pair_pem()?;
//! let tokens = TokenService::new(
//!     "https://cadence.dev",
//!     &keys.private_key_pem,
//!     &keys.public_key_pem,
//!     "1h",
//! )?;
//! let issued = tokens.issue_access_token("client_abc", "user-1", Some("calendar:read"), "cadence-mcp")?;
//! println!("expires in {}s", issued.expires_in);
//! # Ok(())
//! # }
//! ```

// ── Public API ──────────────────────────────────────────────────────────
// These modules are consumed by the host server's HTTP layer, the keygen
// binary (src/bin/) and the integration tests (tests/).

/// Configuration surface consumed from the host (issuer, keys, TTLs, allow-lists)
pub mod config;

/// Cryptographic utilities: RSA key provisioning and encryption at rest
pub mod crypto;

/// Unified error handling with standard error codes
pub mod errors;

/// Background task lifecycle (abort-on-drop periodic sweeps)
pub mod lifecycle;

/// OAuth 2.0 client (Cadence as client to the upstream calendar provider)
pub mod oauth;

/// OAuth 2.1 authorization server (Cadence as provider for MCP clients)
pub mod oauth2_server;
