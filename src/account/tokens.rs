/// Single-use account tokens and session JWTs
use crate::{
    db::account::IssuedToken,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Verification links are valid for a day
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

/// Reset links are valid for an hour
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// 32 random bytes from the OS CSPRNG, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hex digest used to store reset tokens
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// New email verification token, stored as issued
pub fn issue_verification_token(now: DateTime<Utc>) -> IssuedToken {
    IssuedToken {
        token: generate_token(),
        expires_at: now + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS),
    }
}

/// A reset token split into the value mailed to the user and the digest we keep
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub plaintext: String,
    pub stored: IssuedToken,
}

pub fn issue_reset_token(now: DateTime<Utc>) -> ResetToken {
    let plaintext = generate_token();
    let stored = IssuedToken {
        token: hash_token(&plaintext),
        expires_at: now + Duration::hours(RESET_TOKEN_TTL_HOURS),
    };
    ResetToken { plaintext, stored }
}

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 session token issuer
#[derive(Clone)]
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days),
        }
    }

    pub fn issue(&self, account_id: &str) -> AppResult<String> {
        self.issue_at(account_id, Utc::now())
    }

    fn issue_at(&self, account_id: &str, now: DateTime<Utc>) -> AppResult<String> {
        let claims = SessionClaims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign session token: {}", e)))
    }

    /// Verify signature and expiry
    pub fn validate(&self, token: &str) -> AppResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Session token rejected: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::Authentication("Token has expired".to_string())
                    }
                    _ => AppError::Authentication("Invalid token".to_string()),
                }
            })
    }
}
