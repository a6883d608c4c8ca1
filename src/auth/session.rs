use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::User;

pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTokenError {
    Expired,
    Invalid,
}

/// Signs and verifies the HS256 session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// A random secret, for servers started without one configured.
    pub fn random() -> Self {
        let secret: [u8; 32] = rand::random();
        Self::new(&secret)
    }

    pub fn create_tokens(&self, user: &User) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign(user, Duration::minutes(ACCESS_TOKEN_TTL_MINUTES))?,
            refresh_token: self.sign(user, Duration::days(REFRESH_TOKEN_TTL_DAYS))?,
        })
    }

    /// Signs a token for `user` that expires `ttl` from now. Negative values
    /// produce already expired tokens.
    pub fn sign(&self, user: &User, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Config(format!("failed to sign session token: {e}")))
    }

    pub fn verify(&self, token: &str) -> std::result::Result<Claims, SessionTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionTokenError::Expired,
                _ => SessionTokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserRole;

    fn user() -> User {
        User {
            id: 7,
            username: "testuser".to_string(),
            email: "test@test.fi".to_string(),
            password_hash: String::new(),
            role: UserRole::Admin,
            created_on: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_token_pair_round_trip() {
        let keys = SessionKeys::new(b"secret");
        let pair = keys.create_tokens(&user()).unwrap();

        let access = keys.verify(&pair.access_token).unwrap();
        assert_eq!(access.id, 7);
        assert_eq!(access.username, "testuser");
        assert_eq!(access.role, "admin");
        assert_eq!(access.exp - access.iat, 15 * 60);

        let refresh = keys.verify(&pair.refresh_token).unwrap();
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_expired_token_is_distinguished() {
        let keys = SessionKeys::new(b"secret");
        let token = keys.sign(&user(), Duration::hours(-1)).unwrap();
        assert_eq!(keys.verify(&token), Err(SessionTokenError::Expired));
    }

    #[test]
    fn test_foreign_or_garbage_token_is_invalid() {
        let keys = SessionKeys::new(b"secret");
        let other = SessionKeys::new(b"other");
        let token = other.sign(&user(), Duration::minutes(5)).unwrap();

        assert_eq!(keys.verify(&token), Err(SessionTokenError::Invalid));
        assert_eq!(keys.verify("not.a.jwt"), Err(SessionTokenError::Invalid));
    }
}
