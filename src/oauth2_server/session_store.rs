// ABOUTME: Short-lived authenticated-user sessions for the interactive consent step
// ABOUTME: Sessions expire lazily on read and are deleted explicitly on logout
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

use super::models::UserSession;
use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Store of consent sessions bridging the login UI to code issuance
pub struct SessionStore {
    sessions: RwLock<HashMap<String, UserSession>>,
    expiry: Duration,
}

impl SessionStore {
    /// Create a store whose sessions live for `expiry_hours` hours
    #[must_use]
    pub fn new(expiry_hours: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            expiry: Duration::hours(expiry_hours),
        }
    }

    /// Create a new session for an authenticated user.
    ///
    /// # Errors
    /// Returns a crypto error if the system RNG fails.
    pub async fn create_session(&self, user_id: &str) -> AppResult<UserSession> {
        let session_id = Self::generate_session_id()?;
        let created_at = Utc::now();

        let session = UserSession {
            session_id: session_id.clone(),
            user_id: user_id.to_owned(),
            created_at,
            expires_at: created_at + self.expiry,
        };

        self.sessions
            .write()
            .await
            .insert(session_id, session.clone());
        Ok(session)
    }

    /// Look up a session, lazily deleting it if it has expired.
    pub async fn get_session(&self, session_id: &str) -> Option<UserSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get(session_id)?;

        if session.expires_at <= Utc::now() {
            sessions.remove(session_id);
            return None;
        }

        Some(session.clone())
    }

    /// Delete a session (explicit logout path). Returns whether it existed.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Generate a high-entropy session identifier
    fn generate_session_id() -> AppResult<String> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes).map_err(|e| {
            tracing::error!("CRITICAL: SystemRandom failed - cannot generate session id: {e:?}");
            AppError::crypto("System RNG failure - cannot generate session id")
        })?;
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }
}
