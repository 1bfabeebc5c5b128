//! Handling log-in requests.

use axum::{Json, extract::State};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::{
        AuthResponse, cookie::set_refresh_token_cookie, refresh_token::revoke_all_refresh_tokens,
        session::start_session,
    },
    json::ApiJson,
    user::{UserProfile, bump_token_version, get_user_by_email_or_username},
};

/// The credentials for logging in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInRequest {
    /// Either the user's email or their username.
    pub email_or_username: String,
    /// The password in plain text.
    pub password: String,
}

/// A route handler for logging in with an email or username and password.
///
/// Logging in ends every other session of the user: their token version is
/// bumped, which invalidates their outstanding access tokens, and their
/// refresh tokens are revoked.
///
/// # Errors
///
/// Returns a 401 response if the credentials are wrong or the account has
/// been deactivated.
pub async fn log_in(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    ApiJson(request): ApiJson<LogInRequest>,
) -> Result<(PrivateCookieJar, Json<AuthResponse>), Error> {
    if request.email_or_username.trim().is_empty() || request.password.is_empty() {
        return Err(Error::InvalidRequestBody(
            "emailOrUsername and password are required".to_owned(),
        ));
    }

    let user = match get_user_by_email_or_username(&request.email_or_username, &*state.db()?) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    if !user.password_hash.matches(&request.password)? {
        return Err(Error::InvalidCredentials);
    }

    if user.is_deleted() {
        return Err(Error::AccountDisabled);
    }

    let (user, session) = {
        let mut connection = state.db()?;
        let transaction = connection.transaction()?;

        let mut user = user;
        user.token_version = bump_token_version(user.id, &transaction)?;
        let revoked = revoke_all_refresh_tokens(user.id, &transaction)?;
        let session = start_session(&user, &state.token_keys, &state.auth_config, &transaction)?;

        transaction.commit()?;
        tracing::debug!("Revoked {revoked} refresh tokens for user {}", user.id);

        (user, session)
    };

    tracing::info!("User {} logged in", user.id);

    let jar = set_refresh_token_cookie(
        jar,
        session.refresh_token,
        state.auth_config.refresh_token_ttl,
        state.auth_config.secure_cookies,
    );

    Ok((
        jar,
        Json(AuthResponse {
            access_token: session.access_token,
            user: UserProfile::from(&user),
            message: "Login successful".to_owned(),
        }),
    ))
}
