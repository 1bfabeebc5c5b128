//! Persistence for issued refresh tokens.
//!
//! Only a SHA-256 hash of each token is stored. A token can be used while it
//! is unexpired and unrevoked; using it revokes it.

use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::{Error, auth::token::hash_token, user::UserID};

/// A refresh token as stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshTokenRecord {
    /// The row ID.
    pub id: i64,
    /// The user the token was issued to.
    pub user_id: UserID,
    /// When the token stops being accepted.
    pub expires_at: OffsetDateTime,
    /// Whether the token has been used, logged out or otherwise revoked.
    pub is_revoked: bool,
}

/// Create the refresh token table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_refresh_token_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS refresh_token (
                id INTEGER PRIMARY KEY,
                token_hash TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                is_revoked INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_refresh_token_user_id ON refresh_token(user_id)",
        (),
    )?;

    Ok(())
}

/// Store a newly issued refresh token.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn store_refresh_token(
    user_id: UserID,
    token: &str,
    expires_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO refresh_token (token_hash, user_id, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        (
            hash_token(token),
            user_id.as_i64(),
            expires_at.unix_timestamp(),
            OffsetDateTime::now_utc(),
        ),
    )?;

    Ok(())
}

/// Get the stored record for `token`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the token was never stored, or a
/// [Error::SqlError] if an SQL related error occurred.
pub fn get_refresh_token(token: &str, connection: &Connection) -> Result<RefreshTokenRecord, Error> {
    connection
        .prepare(
            "SELECT id, user_id, expires_at, is_revoked FROM refresh_token
             WHERE token_hash = :token_hash",
        )?
        .query_row(&[(":token_hash", &hash_token(token))], |row| {
            let expires_at: i64 = row.get(2)?;

            Ok(RefreshTokenRecord {
                id: row.get(0)?,
                user_id: UserID::new(row.get(1)?),
                expires_at: OffsetDateTime::from_unix_timestamp(expires_at)
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH),
                is_revoked: row.get(3)?,
            })
        })
        .map_err(|error| error.into())
}

/// Revoke the refresh token with the row ID `id` if it has not been revoked yet.
///
/// Returns `true` if this call revoked the token and `false` if it was
/// already revoked, which lets callers consume a token at most once.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn revoke_refresh_token_by_id(id: i64, connection: &Connection) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "UPDATE refresh_token SET is_revoked = 1 WHERE id = ?1 AND is_revoked = 0",
        (id,),
    )?;

    Ok(rows_affected == 1)
}

/// Revoke `token`, e.g., when its owner logs out.
///
/// Returns `true` if an unrevoked token was found and revoked.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn revoke_refresh_token(token: &str, connection: &Connection) -> Result<bool, Error> {
    let id = connection
        .query_row(
            "SELECT id FROM refresh_token WHERE token_hash = ?1",
            (hash_token(token),),
            |row| row.get(0),
        )
        .optional()?;

    match id {
        Some(id) => revoke_refresh_token_by_id(id, connection),
        None => Ok(false),
    }
}

/// Revoke every unrevoked refresh token belonging to `user_id`.
///
/// Returns the number of tokens that were revoked.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn revoke_all_refresh_tokens(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    connection
        .execute(
            "UPDATE refresh_token SET is_revoked = 1 WHERE user_id = ?1 AND is_revoked = 0",
            (user_id.as_i64(),),
        )
        .map_err(|error| error.into())
}

/// Delete refresh tokens that expired at or before `now`.
///
/// Returns the number of deleted tokens.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn delete_expired_refresh_tokens(
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "DELETE FROM refresh_token WHERE expires_at <= ?1",
            (now.unix_timestamp(),),
        )
        .map_err(|error| error.into())
}
