use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::accounts::validators::{Dni, PhoneNumber};

/// Base identity every account carries. `username` is the identifying field
/// used at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Identity {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    #[sqlx(flatten)]
    pub identity: Identity,
    #[sqlx(try_from = "i64")]
    pub dni: Dni,
    #[sqlx(try_from = "i64")]
    pub phone_number: PhoneNumber,
    /// Argon2 PHC string, never plaintext.
    pub password: String,
    pub is_active: bool,
    pub date_joined: i64,
    pub last_login: Option<i64>,
}
