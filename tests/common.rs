// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides logging init, shared RSA key material and store construction helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Shared test utilities for `cadence_auth`

use cadence_auth::crypto::encryption::AesGcmFileEncryption;
use cadence_auth::crypto::keys::{generate_rsa_key_pair_pem, RsaKeyPairPem};
use cadence_auth::oauth2_server::{ClientRegistry, MemoryClientStore, TokenService};
use std::sync::{Arc, Once, OnceLock};

/// Issuer baked into test token services
pub const TEST_ISSUER: &str = "https://auth.cadence.test";

/// Audience baked into test token services
pub const TEST_AUDIENCE: &str = "cadence-mcp";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

static TEST_KEYS: OnceLock<RsaKeyPairPem> = OnceLock::new();

/// RSA key pair shared across tests - generating one per test is slow
pub fn get_shared_test_keys() -> &'static RsaKeyPairPem {
    TEST_KEYS.get_or_init(|| generate_rsa_key_pair_pem().expect("Failed to generate test RSA keys"))
}

/// Token service over the shared test keys
pub fn create_token_service(access_token_ttl: &str) -> TokenService {
    init_test_logging();
    let keys = get_shared_test_keys();
    TokenService::new(
        TEST_ISSUER,
        &keys.private_key_pem,
        &keys.public_key_pem,
        access_token_ttl,
    )
    .expect("Failed to build test token service")
}

/// In-memory client registry with the given allow-list
pub async fn create_test_registry(allowed_redirect_uris: Vec<String>) -> ClientRegistry {
    init_test_logging();
    ClientRegistry::new(Arc::new(MemoryClientStore), allowed_redirect_uris).await
}

/// Deterministic-key encryption service for persistence round-trips
pub fn test_encryption() -> Arc<AesGcmFileEncryption> {
    Arc::new(AesGcmFileEncryption::from_bytes([9u8; 32]))
}
