//! Password hashing and JWT session tokens
//!
//! Tokens are HS256 with `sub` = username and `exp` as a unix timestamp.
//! Passwords are stored as base64(sha256(salt || password)) with a random
//! per-user salt.

use crate::api::AppState;
use crate::db;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    BASE64.encode(hasher.finalize())
}

pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt) == expected_hash
}

pub fn issue_token(
    username: &str,
    secret: &str,
    expiry_minutes: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: username.to_string(),
        exp: (Utc::now() + Duration::minutes(expiry_minutes)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Extractor for authenticated routes. Resolves the bearer token to a
/// full user record.
pub struct AuthUser(pub db::User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = crate::api::AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| crate::api::AppError::Unauthorized("Not authenticated".to_string()))?;

        let claims = decode_token(bearer.token(), &state.config.secret_key).map_err(|_| {
            crate::api::AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        let user = state.db.get_user_by_username(&claims.sub).map_err(|_| {
            crate::api::AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_per_salt() {
        let salt = generate_salt();
        let a = hash_password("hunter22", &salt);
        let b = hash_password("hunter22", &salt);
        assert_eq!(a, b);
        assert!(verify_password("hunter22", &salt, &a));
        assert!(!verify_password("wrong", &salt, &a));
    }

    #[test]
    fn different_salts_produce_different_hashes() {
        let a = hash_password("hunter22", &generate_salt());
        let b = hash_password("hunter22", &generate_salt());
        assert_ne!(a, b);
    }

    #[test]
    fn token_round_trip() {
        let token = issue_token("alice", "secret", 60).unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let token = issue_token("alice", "secret", 60).unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token("alice", "secret", -10).unwrap();
        assert!(decode_token(&token, "secret").is_err());
    }
}
