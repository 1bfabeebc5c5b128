//! One-time tokens for resetting a forgotten password.

use rand::{RngCore, thread_rng};
use rusqlite::{Connection, OptionalExtension};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::token::hash_token,
    user::{User, UserID, get_user_by_id},
};

/// The number of random bytes in a reset token.
const RESET_TOKEN_BYTES: usize = 32;

/// A password reset as stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordResetRecord {
    /// The row ID.
    pub id: i64,
    /// The user whose password may be reset.
    pub user_id: UserID,
    /// When the token stops being accepted.
    pub expires_at: OffsetDateTime,
    /// When the token was used, if it has been.
    pub used_at: Option<OffsetDateTime>,
}

/// Create the password reset table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_password_reset_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS password_reset (
                id INTEGER PRIMARY KEY,
                hashed_token TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                used_at TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_password_reset_hashed_token
         ON password_reset(hashed_token)",
        (),
    )?;

    Ok(())
}

/// Generate a random reset token as a hex string.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    thread_rng().fill_bytes(&mut bytes);

    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Issue a new reset token for `user_id` that is valid for `ttl`.
///
/// Any reset tokens previously issued to the user are deleted. Only the hash
/// of the token is stored; the returned raw token is what gets emailed.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn issue_password_reset(
    user_id: UserID,
    ttl: Duration,
    connection: &Connection,
) -> Result<String, Error> {
    let token = generate_reset_token();
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "DELETE FROM password_reset WHERE user_id = ?1",
        (user_id.as_i64(),),
    )?;
    connection.execute(
        "INSERT INTO password_reset (hashed_token, user_id, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        (
            hash_token(&token),
            user_id.as_i64(),
            now.saturating_add(ttl).unix_timestamp(),
            now,
        ),
    )?;

    Ok(token)
}

fn get_unused_password_reset(
    token: &str,
    connection: &Connection,
) -> Result<Option<PasswordResetRecord>, Error> {
    connection
        .query_row(
            "SELECT id, user_id, expires_at, used_at FROM password_reset
             WHERE hashed_token = ?1 AND used_at IS NULL",
            (hash_token(token),),
            |row| {
                let expires_at: i64 = row.get(2)?;

                Ok(PasswordResetRecord {
                    id: row.get(0)?,
                    user_id: UserID::new(row.get(1)?),
                    expires_at: OffsetDateTime::from_unix_timestamp(expires_at)
                        .unwrap_or(OffsetDateTime::UNIX_EPOCH),
                    used_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|error| error.into())
}

/// Check that `token` can be used to reset a password at `now`.
///
/// Returns the stored reset and the user it belongs to.
///
/// # Errors
///
/// Returns [Error::InvalidResetToken] if the token is unknown, already used,
/// expired, or its user no longer exists or has been deactivated. Returns a
/// [Error::SqlError] if an SQL related error occurred.
pub fn verify_reset_token(
    token: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(PasswordResetRecord, User), Error> {
    let record = get_unused_password_reset(token, connection)?.ok_or_else(|| {
        Error::InvalidResetToken("reset token is invalid or has already been used".to_owned())
    })?;

    if record.expires_at <= now {
        return Err(Error::InvalidResetToken(
            "reset token has expired".to_owned(),
        ));
    }

    let user = match get_user_by_id(record.user_id, connection) {
        Ok(user) if !user.is_deleted() => user,
        Ok(_) | Err(Error::NotFound) => {
            return Err(Error::InvalidResetToken(
                "user does not exist or has been deactivated".to_owned(),
            ));
        }
        Err(error) => return Err(error),
    };

    Ok((record, user))
}

/// Mark the reset with the row ID `id` as used.
///
/// # Errors
///
/// Returns [Error::InvalidResetToken] if the reset was already used, which
/// happens when two requests race to use the same token. Returns a
/// [Error::SqlError] if an SQL related error occurred.
pub fn consume_password_reset(id: i64, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE password_reset SET used_at = ?1 WHERE id = ?2 AND used_at IS NULL",
        (OffsetDateTime::now_utc(), id),
    )?;

    match rows_affected {
        1 => Ok(()),
        _ => Err(Error::InvalidResetToken(
            "reset token is invalid or has already been used".to_owned(),
        )),
    }
}

/// Delete resets that expired at or before `now` or have been used.
///
/// Returns the number of deleted resets.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn delete_stale_password_resets(
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "DELETE FROM password_reset WHERE expires_at <= ?1 OR used_at IS NOT NULL",
            (now.unix_timestamp(),),
        )
        .map_err(|error| error.into())
}
