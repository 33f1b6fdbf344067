// ABOUTME: Cryptography module providing key provisioning and encryption at rest
// ABOUTME: Centralizes all cryptographic operations for the cadence-auth subsystem
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

//! Cryptographic utilities for the Cadence credential subsystem

pub mod encryption;
pub mod keys;

pub use encryption::{AesGcmFileEncryption, EncryptionService};
pub use keys::{generate_rsa_key_pair_pem, RsaKeyPairPem};
