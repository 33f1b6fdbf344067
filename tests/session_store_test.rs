// ABOUTME: Integration tests for the consent session store
// ABOUTME: Validates creation, lazy expiry on read and explicit logout deletion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Cadence Works

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use cadence_auth::config::SESSION_EXPIRY_HOURS;
use cadence_auth::oauth2_server::SessionStore;
use chrono::Utc;

#[tokio::test]
async fn test_create_and_get_session() {
    common::init_test_logging();
    let store = SessionStore::new(SESSION_EXPIRY_HOURS);

    let session = store.create_session("user-42").await.unwrap();
    assert_eq!(session.user_id, "user-42");
    assert!(session.expires_at > Utc::now());
    assert_eq!(session.session_id.len(), 43);

    let fetched = store.get_session(&session.session_id).await.unwrap();
    assert_eq!(fetched.user_id, "user-42");
    assert_eq!(fetched.created_at, session.created_at);
}

#[tokio::test]
async fn test_session_ids_are_unique() {
    common::init_test_logging();
    let store = SessionStore::new(SESSION_EXPIRY_HOURS);
    let first = store.create_session("user-42").await.unwrap();
    let second = store.create_session("user-42").await.unwrap();
    assert_ne!(first.session_id, second.session_id);
}

#[tokio::test]
async fn test_expired_session_is_deleted_on_read() {
    common::init_test_logging();
    let store = SessionStore::new(-1);
    let session = store.create_session("user-42").await.unwrap();

    assert!(store.get_session(&session.session_id).await.is_none());
    // Already gone, so an explicit delete has nothing to remove
    assert!(!store.delete_session(&session.session_id).await);
}

#[tokio::test]
async fn test_delete_session_logout_path() {
    common::init_test_logging();
    let store = SessionStore::new(SESSION_EXPIRY_HOURS);
    let session = store.create_session("user-42").await.unwrap();

    assert!(store.delete_session(&session.session_id).await);
    assert!(store.get_session(&session.session_id).await.is_none());
}

#[tokio::test]
async fn test_unknown_session_is_none() {
    common::init_test_logging();
    let store = SessionStore::new(SESSION_EXPIRY_HOURS);
    assert!(store.get_session("no-such-session").await.is_none());
}
