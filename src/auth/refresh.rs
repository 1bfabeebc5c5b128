//! Exchanging a refresh token for a new token pair.

use axum::{Json, extract::State};
use axum_extra::extract::PrivateCookieJar;
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, AuthConfig, Error,
    auth::{
        RefreshResponse,
        cookie::{get_refresh_token_from_cookies, set_refresh_token_cookie},
        refresh_token::{get_refresh_token, revoke_refresh_token_by_id},
        session::{Session, start_session},
        token::{TokenKeys, TokenKind},
    },
    user::get_user_by_id,
};

/// Revoke `refresh_token` and issue a new token pair in its place.
///
/// The stored token is revoked with a conditional update, so if two requests
/// race to rotate the same token only one of them gets a new pair. Every
/// problem with the token is reported as [Error::InvalidRefreshToken].
///
/// # Errors
///
/// Returns [Error::InvalidRefreshToken] if the token cannot be verified, was
/// never issued, was revoked, has expired, or belongs to a missing or
/// deactivated user. Other errors are SQL or token signing errors.
pub fn rotate_refresh_token(
    refresh_token: &str,
    token_keys: &TokenKeys,
    config: &AuthConfig,
    connection: &mut Connection,
) -> Result<Session, Error> {
    let claims = token_keys.decode(TokenKind::Refresh, refresh_token)?;
    let transaction = connection.transaction()?;

    let record = match get_refresh_token(refresh_token, &transaction) {
        Ok(record) if record.user_id == claims.sub && !record.is_revoked => record,
        Ok(_) | Err(Error::NotFound) => return Err(Error::InvalidRefreshToken),
        Err(error) => return Err(error),
    };

    if record.expires_at <= OffsetDateTime::now_utc() {
        revoke_refresh_token_by_id(record.id, &transaction)?;
        transaction.commit()?;
        return Err(Error::InvalidRefreshToken);
    }

    if !revoke_refresh_token_by_id(record.id, &transaction)? {
        return Err(Error::InvalidRefreshToken);
    }

    let user = match get_user_by_id(record.user_id, &transaction) {
        Ok(user) if !user.is_deleted() => user,
        Ok(_) | Err(Error::NotFound) => return Err(Error::InvalidRefreshToken),
        Err(error) => return Err(error),
    };

    let session = start_session(&user, token_keys, config, &transaction)?;
    transaction.commit()?;

    Ok(session)
}

/// A route handler that exchanges the refresh token cookie for a new access
/// token and a new refresh token cookie.
///
/// # Errors
///
/// Returns a 400 response if the cookie is missing or its token is invalid.
pub async fn refresh(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Json<RefreshResponse>), Error> {
    let refresh_token =
        get_refresh_token_from_cookies(&jar).ok_or(Error::InvalidRefreshToken)?;

    let session = rotate_refresh_token(
        &refresh_token,
        &state.token_keys,
        &state.auth_config,
        &mut *state.db()?,
    )?;

    let jar = set_refresh_token_cookie(
        jar,
        session.refresh_token,
        state.auth_config.refresh_token_ttl,
        state.auth_config.secure_cookies,
    );

    Ok((
        jar,
        Json(RefreshResponse {
            access_token: session.access_token,
        }),
    ))
}
