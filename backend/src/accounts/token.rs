use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::clock::unix_now;
use crate::config::Config;
use crate::db::models::User;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is invalid")]
    Invalid,
    #[error("expected a {expected:?} token")]
    WrongType { expected: TokenType },
    #[error("failed to encode token: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Account attributes embedded in every issued token. Contact details
/// (email, phone number) are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub dni: i64,
}

impl From<&User> for UserClaims {
    fn from(user: &User) -> Self {
        Self {
            username: user.identity.username.clone(),
            first_name: user.identity.first_name.clone(),
            last_name: user.identity.last_name.clone(),
            dni: user.dni.get(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    /// Expiry (seconds since epoch)
    pub exp: i64,
    /// Issued-at (seconds since epoch)
    pub iat: i64,
    pub jti: String,
    pub user_id: i64,
    #[serde(flatten)]
    pub user: UserClaims,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Signs and verifies HS256 tokens with a shared secret.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
        )
    }

    fn ttl(&self, token_type: TokenType) -> i64 {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        ttl.as_secs() as i64
    }

    fn sign(
        &self,
        token_type: TokenType,
        user_id: i64,
        user: UserClaims,
        now: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            token_type,
            exp: now + self.ttl(token_type),
            iat: now,
            jti: Uuid::new_v4().simple().to_string(),
            user_id,
            user,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Encode)
    }

    /// Issues a refresh/access pair carrying the user's current claims.
    pub fn obtain_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        self.obtain_pair_at(user, unix_now())
    }

    pub fn obtain_pair_at(&self, user: &User, now: i64) -> Result<TokenPair, TokenError> {
        let claims = UserClaims::from(user);
        Ok(TokenPair {
            refresh: self.sign(TokenType::Refresh, user.id, claims.clone(), now)?,
            access: self.sign(TokenType::Access, user.id, claims, now)?,
        })
    }

    /// Mints a fresh access token from a valid refresh token. The new token
    /// carries the same account claims as the refresh token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, TokenError> {
        let claims = self.verify(refresh_token, TokenType::Refresh)?;
        self.sign(TokenType::Access, claims.user_id, claims.user, unix_now())
    }

    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Invalid,
            })?;

        if claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }
        Ok(claims)
    }
}
