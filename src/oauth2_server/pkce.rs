// ABOUTME: PKCE verifier and challenge primitives implementing RFC 7636
// ABOUTME: Pure functions with format validation that runs before any hashing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

//! Proof Key for Code Exchange (RFC 7636), S256 only.
//!
//! Error messages in this module never echo the submitted verifier.

use super::models::OAuth2Error;
use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Minimum verifier length per RFC 7636 Section 4.1
pub const MIN_VERIFIER_LENGTH: usize = 43;

/// Maximum verifier length per RFC 7636 Section 4.1
pub const MAX_VERIFIER_LENGTH: usize = 128;

/// Default verifier length used when callers do not care
pub const DEFAULT_VERIFIER_LENGTH: usize = 64;

/// Length of a base64url-encoded SHA-256 digest (the S256 challenge)
pub const CHALLENGE_LENGTH: usize = 43;

/// Unreserved characters allowed in a code verifier:
/// `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`
const UNRESERVED: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Generate a cryptographically random code verifier.
///
/// `length` is clamped to the RFC 7636 range `[43, 128]`.
///
/// # Errors
/// Returns a crypto error if the system RNG fails - the server cannot
/// operate securely without working RNG.
pub fn generate_verifier(length: usize) -> AppResult<String> {
    let length = length.clamp(MIN_VERIFIER_LENGTH, MAX_VERIFIER_LENGTH);

    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; length];
    rng.fill(&mut bytes).map_err(|e| {
        tracing::error!("CRITICAL: SystemRandom failed - cannot generate PKCE verifier: {e:?}");
        AppError::crypto("System RNG failure - cannot generate PKCE verifier")
    })?;

    Ok(bytes
        .iter()
        .map(|b| char::from(UNRESERVED[usize::from(*b) % UNRESERVED.len()]))
        .collect())
}

/// Generate a verifier of the default length
///
/// # Errors
/// Returns a crypto error if the system RNG fails.
pub fn generate_default_verifier() -> AppResult<String> {
    generate_verifier(DEFAULT_VERIFIER_LENGTH)
}

/// Compute the S256 challenge for a verifier: SHA-256 digest,
/// base64url-encoded without padding. Always exactly 43 characters.
#[must_use]
pub fn challenge_from_verifier(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Validate verifier length and character set (RFC 7636 Section 4.1)
/// without touching the crypto path.
///
/// # Errors
/// Returns `invalid_grant` if the verifier is out of range or contains
/// characters outside the unreserved set.
pub fn validate_verifier(verifier: &str) -> Result<(), OAuth2Error> {
    if verifier.len() < MIN_VERIFIER_LENGTH || verifier.len() > MAX_VERIFIER_LENGTH {
        return Err(OAuth2Error::invalid_grant(
            "code_verifier must be between 43 and 128 characters",
        ));
    }

    if !verifier.bytes().all(|b| UNRESERVED.contains(&b)) {
        return Err(OAuth2Error::invalid_grant(
            "code_verifier contains invalid characters (RFC 7636: only [A-Z], [a-z], [0-9], -, ., _, ~ allowed)",
        ));
    }

    Ok(())
}

/// Validate challenge length and character set without hashing anything.
///
/// # Errors
/// Returns `invalid_request` if the challenge is out of range or contains
/// characters outside the unreserved set.
pub fn validate_challenge(challenge: &str) -> Result<(), OAuth2Error> {
    if challenge.len() < CHALLENGE_LENGTH || challenge.len() > MAX_VERIFIER_LENGTH {
        return Err(OAuth2Error::invalid_request(
            "code_challenge must be between 43 and 128 characters",
        ));
    }

    if !challenge.bytes().all(|b| UNRESERVED.contains(&b)) {
        return Err(OAuth2Error::invalid_request(
            "code_challenge contains invalid characters",
        ));
    }

    Ok(())
}

/// Check a verifier against a stored challenge.
///
/// Only the `"S256"` method is supported; any other method is an error, not
/// a `false`. Malformed input is rejected before any hashing occurs. The
/// comparison is constant-time.
///
/// # Errors
/// Returns `invalid_grant` for an unsupported method or a malformed
/// verifier, `invalid_request` for a malformed challenge.
pub fn verify(verifier: &str, challenge: &str, method: &str) -> Result<bool, OAuth2Error> {
    if method != "S256" {
        return Err(OAuth2Error::invalid_grant(
            "Only S256 code_challenge_method is supported (plain method is not allowed for security reasons)",
        ));
    }

    validate_verifier(verifier)?;
    validate_challenge(challenge)?;

    let computed = challenge_from_verifier(verifier);
    Ok(computed.as_bytes().ct_eq(challenge.as_bytes()).into())
}
