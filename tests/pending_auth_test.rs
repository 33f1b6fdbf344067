// ABOUTME: Integration tests for the pending upstream-auth store
// ABOUTME: Covers CSRF state lifecycle, TTL expiry, sweeps and encrypted snapshot round-trips
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Cadence Works

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use cadence_auth::crypto::encryption::EncryptionService;
use cadence_auth::oauth2_server::pkce;
use cadence_auth::oauth::PendingAuthStore;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

const REDIRECT_URI: &str = "http://localhost:8081/oauth/google/callback";

fn store_at(dir: &TempDir, ttl_secs: i64) -> PendingAuthStore {
    common::init_test_logging();
    PendingAuthStore::new(
        dir.path().join("pending.enc"),
        common::test_encryption(),
        ttl_secs,
    )
}

#[tokio::test]
async fn test_create_returns_state_and_pkce_pair() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir, 600);

    let created = store.create(REDIRECT_URI).await.unwrap();
    assert!(Uuid::parse_str(&created.state).is_ok());
    assert_eq!(created.code_verifier.len(), pkce::DEFAULT_VERIFIER_LENGTH);
    assert_eq!(
        created.code_challenge,
        pkce::challenge_from_verifier(&created.code_verifier)
    );
    assert_eq!(created.code_challenge.len(), pkce::CHALLENGE_LENGTH);
}

#[tokio::test]
async fn test_find_by_state_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir, 600);

    let created = store.create(REDIRECT_URI).await.unwrap();
    let entry = store.find_by_state(&created.state).await.unwrap();
    assert_eq!(entry.code_verifier, created.code_verifier);
    assert_eq!(entry.redirect_uri, REDIRECT_URI);
    assert!(entry.expires_at > entry.created_at);

    assert!(store.find_by_state("unknown-state").await.is_none());
}

#[tokio::test]
async fn test_remove_then_find_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir, 600);

    let created = store.create(REDIRECT_URI).await.unwrap();
    assert!(store.remove(&created.state).await);
    assert!(store.find_by_state(&created.state).await.is_none());
    assert!(!store.remove(&created.state).await);
}

#[tokio::test]
async fn test_expired_entry_is_deleted_on_lookup() {
    let dir = tempfile::tempdir().unwrap();
    // Negative TTL: entries are born expired
    let store = store_at(&dir, -1);

    let created = store.create(REDIRECT_URI).await.unwrap();
    assert!(store.find_by_state(&created.state).await.is_none());
    // Lazy deletion already removed it, nothing left to sweep
    assert_eq!(store.cleanup_expired().await, 0);
}

#[tokio::test]
async fn test_cleanup_expired_counts_removals() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir, -1);

    store.create(REDIRECT_URI).await.unwrap();
    store.create(REDIRECT_URI).await.unwrap();
    assert_eq!(store.cleanup_expired().await, 2);
    assert_eq!(store.cleanup_expired().await, 0);
}

#[tokio::test]
async fn test_persist_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let created = {
        let store = store_at(&dir, 600);
        let created = store.create(REDIRECT_URI).await.unwrap();
        // Explicit persist so the test does not race the fire-and-forget write
        store.persist().await.unwrap();
        created
    };

    let store = store_at(&dir, 600);
    store.load().await;

    let entry = store.find_by_state(&created.state).await.unwrap();
    assert_eq!(entry.code_verifier, created.code_verifier);
    assert_eq!(entry.redirect_uri, REDIRECT_URI);
}

#[tokio::test]
async fn test_load_filters_expired_entries() {
    let dir = tempfile::tempdir().unwrap();

    let state = {
        let store = store_at(&dir, -1);
        let created = store.create(REDIRECT_URI).await.unwrap();
        store.persist().await.unwrap();
        created.state
    };

    let store = store_at(&dir, 600);
    store.load().await;
    assert!(store.find_by_state(&state).await.is_none());
}

#[tokio::test]
async fn test_load_drops_unknown_snapshot_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending.enc");
    let encryption = common::test_encryption();

    let snapshot = serde_json::json!({
        "version": 99,
        "entries": [{
            "state": "s-1",
            "code_verifier": "v".repeat(64),
            "redirect_uri": REDIRECT_URI,
            "created_at": chrono::Utc::now(),
            "expires_at": chrono::Utc::now() + chrono::Duration::minutes(10),
        }]
    });
    encryption
        .encrypt_to_file(snapshot.to_string().as_bytes(), &path)
        .await
        .unwrap();

    let store = PendingAuthStore::new(path, encryption, 600);
    store.load().await;
    assert!(store.find_by_state("s-1").await.is_none());
}

#[tokio::test]
async fn test_corrupt_snapshot_does_not_prevent_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending.enc");
    std::fs::write(&path, b"garbage bytes").unwrap();

    let store = PendingAuthStore::new(path, common::test_encryption(), 600);
    store.load().await;

    // The store is empty but fully usable
    let created = store.create(REDIRECT_URI).await.unwrap();
    assert!(store.find_by_state(&created.state).await.is_some());
}

#[tokio::test]
async fn test_states_are_unique_across_entries() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir, 600);

    let first = store.create(REDIRECT_URI).await.unwrap();
    let second = store.create(REDIRECT_URI).await.unwrap();
    assert_ne!(first.state, second.state);
    assert_ne!(first.code_verifier, second.code_verifier);
}
