//! Periodic cleanup of expired tokens.

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{
        AccessTokenBlacklist, password_reset::delete_stale_password_resets,
        refresh_token::delete_expired_refresh_tokens,
    },
};

/// Delete expired refresh tokens and stale password resets, and drop expired
/// entries from the access token blacklist.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn prune_expired_tokens(
    connection: &Connection,
    blacklist: &AccessTokenBlacklist,
    now: OffsetDateTime,
) -> Result<(), Error> {
    let refresh_tokens = delete_expired_refresh_tokens(now, connection)?;
    let password_resets = delete_stale_password_resets(now, connection)?;
    let blacklisted = blacklist.prune(now);

    tracing::debug!(
        "Pruned {refresh_tokens} refresh tokens, {password_resets} password resets and \
        {blacklisted} blacklisted access tokens"
    );

    Ok(())
}
