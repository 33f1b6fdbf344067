// ABOUTME: Unified error handling for non-protocol failures (config, storage, crypto)
// ABOUTME: OAuth protocol errors live in oauth2_server::models::OAuth2Error instead
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

//! # Unified Error Handling
//!
//! Application-level errors for conditions that are not part of the OAuth
//! error taxonomy: corrupt key material, failed snapshot writes, RNG
//! failures, invalid configuration. Protocol-level errors
//! (`invalid_grant`, `invalid_client`, ...) are modeled separately as
//! [`crate::oauth2_server::models::OAuth2Error`] so they can be serialized
//! onto the wire per RFC 6749.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Configuration is missing or invalid (bad TTL string, malformed PEM)
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError,
    /// Persisted snapshot could not be written or read
    #[serde(rename = "STORAGE_ERROR")]
    StorageError,
    /// Cryptographic operation failed (RNG, cipher, key generation)
    #[serde(rename = "CRYPTO_ERROR")]
    CryptoError,
    /// Data serialization/deserialization failed
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError,
    /// An unexpected internal condition
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::ConfigError => "Configuration error encountered",
            Self::StorageError => "Storage operation failed",
            Self::CryptoError => "Cryptographic operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
            Self::InternalError => "An internal error occurred",
        }
    }
}

/// Unified error type for non-protocol failures
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Cryptographic error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, message)
    }

    /// Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
