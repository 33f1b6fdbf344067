// ABOUTME: RS256 access token issuance and verification with detailed validation errors
// ABOUTME: Tokens are self-verifying JWTs - validity is proven by signature and claims, not a lookup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

use super::models::TokenResponse;
use crate::config::parse_ttl;
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims carried by every access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer
    pub iss: String,
    /// Subject (user id)
    pub sub: String,
    /// Audience the token is intended for
    pub aud: String,
    /// Expiration timestamp (unix seconds, absolute wall-clock)
    pub exp: i64,
    /// Issued-at timestamp
    pub iat: i64,
    /// Unique token identifier
    pub jti: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Space-separated granted scopes
    pub scope: Option<String>,
}

/// Token validation error with detailed information
#[derive(Debug, Clone)]
pub enum TokenValidationError {
    /// Token is malformed (not proper JWT format)
    TokenMalformed {
        /// Details about the malformation
        details: String,
    },
    /// Token signature, issuer, audience or algorithm is invalid
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token has expired
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
        /// Current time for reference
        current_time: DateTime<Utc>,
    },
}

impl std::fmt::Display for TokenValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenMalformed { details } => {
                write!(f, "access token is malformed: {details}")
            }
            Self::TokenInvalid { reason } => {
                write!(f, "access token is invalid: {reason}")
            }
            Self::TokenExpired {
                expired_at,
                current_time,
            } => {
                let since = current_time.signed_duration_since(*expired_at);
                write!(
                    f,
                    "access token expired {} minutes ago at {}",
                    since.num_minutes(),
                    expired_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
        }
    }
}

impl std::error::Error for TokenValidationError {}

/// Mints and verifies RS256 access tokens.
///
/// The service holds exactly one RSA key pair; rotation is an operational
/// concern handled by re-provisioning.
pub struct TokenService {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl_secs: i64,
}

impl TokenService {
    /// Create a token service from PEM key material.
    ///
    /// The TTL string is parsed here, not at issuance time, so a bad
    /// configuration fails at startup.
    ///
    /// # Errors
    /// Returns a config error if the TTL string cannot be parsed or either
    /// PEM key is invalid.
    pub fn new(
        issuer: impl Into<String>,
        private_key_pem: &str,
        public_key_pem: &str,
        access_token_ttl: &str,
    ) -> AppResult<Self> {
        let access_token_ttl_secs = parse_ttl(access_token_ttl)?;

        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| AppError::config(format!("Invalid RSA private key PEM: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| AppError::config(format!("Invalid RSA public key PEM: {e}")))?;

        Ok(Self {
            issuer: issuer.into(),
            encoding_key,
            decoding_key,
            access_token_ttl_secs,
        })
    }

    /// Configured access token lifetime in seconds
    #[must_use]
    pub const fn access_token_ttl_secs(&self) -> i64 {
        self.access_token_ttl_secs
    }

    /// Mint a signed access token and its response envelope.
    ///
    /// # Errors
    /// Returns a crypto error if JWT encoding fails.
    pub fn issue_access_token(
        &self,
        client_id: &str,
        user_id: &str,
        scope: Option<&str>,
        audience: &str,
    ) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let expiry = now + Duration::seconds(self.access_token_ttl_secs);

        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: user_id.to_owned(),
            aud: audience.to_owned(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            client_id: client_id.to_owned(),
            scope: scope.map(str::to_owned),
        };

        let token = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::crypto(format!("Failed to sign access token: {e}")))?;

        Ok(TokenResponse {
            access_token: token,
            token_type: "Bearer".to_owned(),
            expires_in: self.access_token_ttl_secs,
            scope: scope.map(str::to_owned),
            refresh_token: None,
        })
    }

    /// Verify an access token and return its claims.
    ///
    /// Checks, in order: segment count, signing algorithm (RS256 only),
    /// signature, issuer, expiry and - when `expected_audience` is supplied -
    /// the audience. Every failure is a typed error, never a raw exception
    /// leaking to the caller.
    ///
    /// # Errors
    /// Returns a [`TokenValidationError`] describing the first failed check.
    pub fn verify_access_token(
        &self,
        token: &str,
        expected_audience: Option<&str>,
    ) -> Result<AccessTokenClaims, TokenValidationError> {
        if token.split('.').count() != 3 {
            return Err(TokenValidationError::TokenMalformed {
                details: "invalid token format (expected header.payload.signature)".to_owned(),
            });
        }

        let header =
            decode_header(token).map_err(|e| TokenValidationError::TokenMalformed {
                details: format!("failed to decode token header: {e}"),
            })?;
        if header.alg != Algorithm::RS256 {
            return Err(TokenValidationError::TokenInvalid {
                reason: "unexpected signing algorithm (only RS256 is accepted)".to_owned(),
            });
        }

        // Expiry is checked manually below so the error can carry timestamps
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.set_issuer(&[&self.issuer]);
        match expected_audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| Self::convert_jwt_error(&e))?;

        let current_time = Utc::now();
        if current_time.timestamp() > claims.exp {
            let expired_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
            tracing::warn!(
                sub = %claims.sub,
                expired_at = %expired_at.to_rfc3339(),
                "Access token expired"
            );
            return Err(TokenValidationError::TokenExpired {
                expired_at,
                current_time,
            });
        }

        Ok(claims)
    }

    /// Extract a bearer token from an `Authorization` header value.
    ///
    /// Accepts only a two-part `"Bearer <token>"` header; the scheme is
    /// matched case-insensitively. Missing headers, wrong schemes and empty
    /// tokens all yield `None`.
    #[must_use]
    pub fn extract_token_from_header(header: Option<&str>) -> Option<String> {
        let header = header?;
        let mut parts = header.split_whitespace();
        let scheme = parts.next()?;
        let token = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return None;
        }
        Some(token.to_owned())
    }

    /// Convert JWT library errors to detailed validation errors
    fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> TokenValidationError {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::InvalidSignature => TokenValidationError::TokenInvalid {
                reason: "token signature verification failed".to_owned(),
            },
            ErrorKind::InvalidIssuer => TokenValidationError::TokenInvalid {
                reason: "token issuer mismatch".to_owned(),
            },
            ErrorKind::InvalidAudience => TokenValidationError::TokenInvalid {
                reason: "token audience mismatch".to_owned(),
            },
            ErrorKind::InvalidToken => TokenValidationError::TokenMalformed {
                details: "token format is invalid".to_owned(),
            },
            ErrorKind::Base64(base64_err) => TokenValidationError::TokenMalformed {
                details: format!("token contains invalid base64: {base64_err}"),
            },
            ErrorKind::Json(json_err) => TokenValidationError::TokenMalformed {
                details: format!("token contains invalid JSON: {json_err}"),
            },
            ErrorKind::Utf8(utf8_err) => TokenValidationError::TokenMalformed {
                details: format!("token contains invalid UTF-8: {utf8_err}"),
            },
            _ => TokenValidationError::TokenInvalid {
                reason: format!("token validation failed: {e}"),
            },
        }
    }
}
