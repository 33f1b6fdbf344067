// ABOUTME: Unit tests for the PKCE verifier/challenge primitives
// ABOUTME: Validates generation, S256 derivation, format validation and verification
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Cadence Works

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use cadence_auth::oauth2_server::pkce;

const UNRESERVED: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

#[test]
fn test_generated_verifier_has_default_length_and_charset() {
    let verifier = pkce::generate_default_verifier().unwrap();
    assert_eq!(verifier.len(), pkce::DEFAULT_VERIFIER_LENGTH);
    assert!(verifier.chars().all(|c| UNRESERVED.contains(c)));
}

#[test]
fn test_generate_verifier_clamps_length() {
    assert_eq!(pkce::generate_verifier(10).unwrap().len(), 43);
    assert_eq!(pkce::generate_verifier(200).unwrap().len(), 128);
    assert_eq!(pkce::generate_verifier(50).unwrap().len(), 50);
}

#[test]
fn test_challenge_is_exactly_43_characters() {
    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);
    assert_eq!(challenge.len(), pkce::CHALLENGE_LENGTH);
    // base64url without padding
    assert!(!challenge.contains('='));
    assert!(!challenge.contains('+'));
    assert!(!challenge.contains('/'));
}

#[test]
fn test_verify_round_trip() {
    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);
    assert!(pkce::verify(&verifier, &challenge, "S256").unwrap());
}

#[test]
fn test_verify_fails_for_any_single_mutated_character() {
    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);

    for position in 0..verifier.len() {
        let mut mutated: Vec<char> = verifier.chars().collect();
        // Replace with a character guaranteed to differ but stay in-charset
        mutated[position] = if mutated[position] == 'A' { 'B' } else { 'A' };
        let mutated: String = mutated.into_iter().collect();
        assert!(
            !pkce::verify(&mutated, &challenge, "S256").unwrap(),
            "mutation at position {position} unexpectedly verified"
        );
    }
}

#[test]
fn test_verify_errors_on_non_s256_method() {
    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);

    let plain = pkce::verify(&verifier, &challenge, "plain");
    assert!(plain.is_err(), "plain method must be an error, not false");
    assert_eq!(plain.unwrap_err().error, "invalid_grant");
    assert!(pkce::verify(&verifier, &challenge, "s256").is_err());
}

#[test]
fn test_verify_rejects_malformed_input_before_hashing() {
    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);

    // Verifier too short
    assert!(pkce::verify("short", &challenge, "S256").is_err());
    // Verifier with a character outside the unreserved set
    let bad = format!("{}!", &verifier[..verifier.len() - 1]);
    assert!(pkce::verify(&bad, &challenge, "S256").is_err());
    // Challenge too short
    assert!(pkce::verify(&verifier, "tooshort", "S256").is_err());
}

#[test]
fn test_validate_verifier_bounds() {
    assert!(pkce::validate_verifier(&"a".repeat(42)).is_err());
    assert!(pkce::validate_verifier(&"a".repeat(43)).is_ok());
    assert!(pkce::validate_verifier(&"a".repeat(128)).is_ok());
    assert!(pkce::validate_verifier(&"a".repeat(129)).is_err());
    assert!(pkce::validate_verifier(&"a!".repeat(25)).is_err());
}

#[test]
fn test_validate_challenge_bounds() {
    assert!(pkce::validate_challenge(&"a".repeat(42)).is_err());
    assert!(pkce::validate_challenge(&"a".repeat(43)).is_ok());
    assert!(pkce::validate_challenge(&"a".repeat(129)).is_err());
    assert!(pkce::validate_challenge("has spaces in it but is long enough to pass len").is_err());
}
