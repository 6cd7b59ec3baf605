use sqlx::SqlitePool;

use crate::accounts::validators::{Dni, PhoneNumber};
use crate::db::models::{Identity, User};

pub async fn create_user_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            dni INTEGER UNIQUE NOT NULL CHECK (dni >= 0),
            phone_number INTEGER NOT NULL CHECK (phone_number >= 0),
            password TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            date_joined INTEGER NOT NULL,
            last_login INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id ASC")
        .fetch_all(pool)
        .await
}

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// Whether another row already uses `username`. `exclude_id` skips the row
/// being updated.
pub async fn username_taken(
    pool: &SqlitePool,
    username: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? AND id IS NOT ?)",
    )
    .bind(username)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

pub async fn dni_taken(
    pool: &SqlitePool,
    dni: Dni,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE dni = ? AND id IS NOT ?)",
    )
    .bind(dni.get())
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

pub async fn insert_user(
    pool: &SqlitePool,
    identity: &Identity,
    dni: Dni,
    phone_number: PhoneNumber,
    password_hash: &str,
    date_joined: i64,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (username, first_name, last_name, email, dni, phone_number, password, date_joined)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&identity.username)
    .bind(&identity.first_name)
    .bind(&identity.last_name)
    .bind(&identity.email)
    .bind(dni.get())
    .bind(phone_number.get())
    .bind(password_hash)
    .bind(date_joined)
    .fetch_one(pool)
    .await
}

/// Writes every mutable column of `user` in a single statement.
pub async fn update_user(pool: &SqlitePool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, first_name = ?, last_name = ?, email = ?,
            dni = ?, phone_number = ?, password = ?, is_active = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.identity.username)
    .bind(&user.identity.first_name)
    .bind(&user.identity.last_name)
    .bind(&user.identity.email)
    .bind(user.dni.get())
    .bind(user.phone_number.get())
    .bind(&user.password)
    .bind(user.is_active)
    .bind(user.id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns `false` when no row had that id.
pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
