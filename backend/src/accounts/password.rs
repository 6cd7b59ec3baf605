use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use crate::db::{models::User, repo};
use crate::error::ApiError;

pub const BAD_CREDENTIALS_MESSAGE: &str = "No active account found with the given credentials";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Argon2id with a random salt per password.
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?
            .to_string();

        Ok(hash)
    }

    pub fn verify(&self, password: &str, password_hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

        Ok(self.argon2.verify_password(password.as_bytes(), &parsed).is_ok())
    }
}

/// Looks the account up by `username` and checks the password. Unknown
/// users, wrong passwords and inactive accounts are indistinguishable to the
/// caller.
pub async fn authenticate(
    pool: &SqlitePool,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<User, ApiError> {
    let Some(user) = repo::get_user_by_username(pool, username).await? else {
        debug!("login for unknown username");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS_MESSAGE.to_string()));
    };

    if !user.is_active || !hasher.verify(password, &user.password)? {
        debug!(user_id = user.id, "login rejected");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS_MESSAGE.to_string()));
    }

    Ok(user)
}
