//! Ending a session.

use axum::{Json, extract::State};
use axum_extra::extract::PrivateCookieJar;

use crate::{
    AppState, Error,
    auth::{
        CurrentUser, MessageResponse,
        cookie::{get_refresh_token_from_cookies, invalidate_refresh_token_cookie},
        refresh_token::revoke_refresh_token,
    },
};

/// A route handler that logs the user out.
///
/// The access token used for the request is blacklisted, the refresh token
/// from the cookie is revoked and the cookie is cleared.
///
/// # Errors
///
/// Returns a 401 response without a valid access token and a 400 response
/// without the refresh token cookie.
pub async fn log_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Json<MessageResponse>), Error> {
    let refresh_token =
        get_refresh_token_from_cookies(&jar).ok_or(Error::MissingRefreshToken)?;

    state
        .blacklist
        .insert(&current_user.claims.jti, current_user.claims.expires_at());
    revoke_refresh_token(&refresh_token, &*state.db()?)?;

    tracing::info!("User {} logged out", current_user.user.id);

    Ok((
        invalidate_refresh_token_cookie(jar, state.auth_config.secure_cookies),
        Json(MessageResponse::new("Logged out successfully")),
    ))
}
