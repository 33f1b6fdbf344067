// ABOUTME: Encryption-at-rest service for persisted credential snapshots
// ABOUTME: AES-256-GCM file encryption with a master key from the environment
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

//! Encryption at rest for store snapshots.
//!
//! The client registry and the pending upstream-auth store persist their
//! full tables as JSON documents; this service encrypts those documents on
//! the way to disk. The key comes from `CADENCE_MASTER_ENCRYPTION_KEY`
//! (base64, 32 bytes); in development a temporary key is generated and
//! logged so operators can pin it.

use crate::errors::{AppError, AppResult};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use std::env;
use std::path::Path;
use tracing::{info, warn};

/// AES-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Encrypts plaintext documents to files and decrypts them back.
///
/// `decrypt_from_file` returns `Ok(None)` when the file does not exist, so
/// callers can distinguish "first run" from "corrupt or unreadable".
#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// Encrypt `plaintext` and write it to `path`.
    ///
    /// # Errors
    /// Returns a crypto error if encryption fails, or a storage error if the
    /// file cannot be written.
    async fn encrypt_to_file(&self, plaintext: &[u8], path: &Path) -> AppResult<()>;

    /// Read `path` and decrypt its contents.
    ///
    /// # Errors
    /// Returns a crypto error if the ciphertext is corrupt or was written
    /// with a different key, or a storage error on read failures other than
    /// the file being absent.
    async fn decrypt_from_file(&self, path: &Path) -> AppResult<Option<Vec<u8>>>;
}

/// AES-256-GCM implementation with the nonce prepended to the ciphertext
pub struct AesGcmFileEncryption {
    key: [u8; 32],
}

impl AesGcmFileEncryption {
    /// Create the service from raw key bytes
    #[must_use]
    pub const fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Load the master key from `CADENCE_MASTER_ENCRYPTION_KEY`, or generate
    /// a temporary one for development.
    ///
    /// # Errors
    /// Returns a config error if the environment variable is set but is not
    /// valid base64 or does not decode to exactly 32 bytes.
    pub fn load_or_generate() -> AppResult<Self> {
        if let Ok(encoded_key) = env::var("CADENCE_MASTER_ENCRYPTION_KEY") {
            return Self::load_from_environment(&encoded_key);
        }

        warn!("CADENCE_MASTER_ENCRYPTION_KEY not found in environment");
        warn!("Generating temporary encryption key for development - NOT SECURE FOR PRODUCTION");

        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        warn!(
            "Generated key (save for production): CADENCE_MASTER_ENCRYPTION_KEY={}",
            general_purpose::STANDARD.encode(key)
        );

        Ok(Self { key })
    }

    fn load_from_environment(encoded_key: &str) -> AppResult<Self> {
        info!("Loading master encryption key from environment variable");
        let key_bytes = general_purpose::STANDARD.decode(encoded_key).map_err(|e| {
            AppError::config(format!(
                "Invalid base64 encoding in CADENCE_MASTER_ENCRYPTION_KEY: {e}"
            ))
        })?;

        if key_bytes.len() != 32 {
            return Err(AppError::config(format!(
                "Master encryption key must be exactly 32 bytes, got {} bytes",
                key_bytes.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);
        Ok(Self { key })
    }

    /// Encrypt a plaintext buffer, prepending the random nonce
    fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = GenericArray::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AppError::crypto(format!("Encryption failed: {e}")))?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt a buffer produced by [`Self::encrypt`]
    fn decrypt(&self, encrypted_data: &[u8]) -> AppResult<Vec<u8>> {
        if encrypted_data.len() < NONCE_LEN {
            return Err(AppError::crypto("Encrypted data too short"));
        }

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        let nonce = GenericArray::from_slice(&encrypted_data[..NONCE_LEN]);
        let ciphertext = &encrypted_data[NONCE_LEN..];

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::crypto(format!("Decryption failed: {e}")))
    }
}

#[async_trait]
impl EncryptionService for AesGcmFileEncryption {
    async fn encrypt_to_file(&self, plaintext: &[u8], path: &Path) -> AppResult<()> {
        let encrypted = self.encrypt(plaintext)?;
        tokio::fs::write(path, encrypted).await.map_err(|e| {
            AppError::storage(format!("Failed to write {}: {e}", path.display()))
        })
    }

    async fn decrypt_from_file(&self, path: &Path) -> AppResult<Option<Vec<u8>>> {
        let encrypted = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        self.decrypt(&encrypted).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let service = AesGcmFileEncryption::from_bytes([7u8; 32]);
        let plaintext = br#"{"version":1,"entries":[]}"#;
        let encrypted = service.encrypt(plaintext).unwrap();
        assert_ne!(&encrypted[NONCE_LEN..], plaintext.as_slice());
        let decrypted = service.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let service = AesGcmFileEncryption::from_bytes([7u8; 32]);
        let other = AesGcmFileEncryption::from_bytes([8u8; 32]);
        let encrypted = service.encrypt(b"secret").unwrap();
        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_decrypt_truncated_data_fails() {
        let service = AesGcmFileEncryption::from_bytes([7u8; 32]);
        assert!(service.decrypt(&[1, 2, 3]).is_err());
    }
}
