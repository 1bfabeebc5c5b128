//! Resetting a forgotten password with an emailed one-time token.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword, capitalise_first_char,
    auth::{
        MessageResponse, ValidateResetTokenResponse,
        password_reset::{consume_password_reset, issue_password_reset, verify_reset_token},
        refresh_token::revoke_all_refresh_tokens,
    },
    json::ApiJson,
    mail::{forgot_password_link, password_reset_link},
    user::{User, bump_token_version, get_user_by_email_or_username, update_password},
};

/// The message returned by [forgot_password] whether or not an email was sent.
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If the email exists in our system, you will receive password reset instructions";

/// The body of a forgot password request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    /// The email or username of the account.
    pub email: String,
}

/// The body of a validate reset token request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResetTokenRequest {
    /// The raw token from the reset link.
    pub token: String,
}

/// The body of a reset password request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    /// The raw token from the reset link.
    pub token: String,
    /// The password to change to.
    pub new_password: String,
}

/// Issue a reset token to the active user matching `identifier` and return
/// the user and the raw token. Returns `None` if there is no such user.
fn issue_reset_for(state: &AppState, identifier: &str) -> Result<Option<(User, String)>, Error> {
    let connection = state.db()?;

    let user = match get_user_by_email_or_username(identifier, &connection) {
        Ok(user) if !user.is_deleted() => user,
        Ok(_) | Err(Error::NotFound) => return Ok(None),
        Err(error) => return Err(error),
    };

    let token = issue_password_reset(user.id, state.auth_config.password_reset_ttl, &connection)?;

    Ok(Some((user, token)))
}

/// A route handler that emails a password reset link.
///
/// The response is the same whether or not the account exists, and even if
/// something goes wrong, so that it cannot be used to find registered emails.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Json<MessageResponse> {
    match issue_reset_for(&state, &request.email) {
        Ok(Some((user, token))) => {
            let link = password_reset_link(&state.auth_config.frontend_url, &token);
            state.mailer.send_password_reset(&user.email, &link);
            tracing::info!("Issued a password reset token to user {}", user.id);
        }
        Ok(None) => {
            tracing::debug!("Password reset requested for an unknown or inactive account");
        }
        Err(error) => {
            tracing::error!("Could not issue a password reset token: {error}");
        }
    }

    Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE))
}

/// A route handler that checks whether a reset token can still be used.
///
/// Invalid tokens are not an error: the response says `valid: false` and why.
pub async fn validate_reset_token(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ValidateResetTokenRequest>,
) -> Result<Json<ValidateResetTokenResponse>, Error> {
    let result = verify_reset_token(&request.token, OffsetDateTime::now_utc(), &*state.db()?);

    let response = match result {
        Ok(_) => ValidateResetTokenResponse {
            valid: true,
            message: None,
        },
        Err(Error::InvalidResetToken(reason)) => ValidateResetTokenResponse {
            valid: false,
            message: Some(capitalise_first_char(&reason)),
        },
        Err(error) => return Err(error),
    };

    Ok(Json(response))
}

/// A route handler that sets a new password using a reset token.
///
/// The token can be used once. Every session of the user ends and they are
/// emailed a notification of the change.
///
/// # Errors
///
/// Returns a 400 response if the token cannot be used, or the new password is
/// too weak or the same as the current one.
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    let new_password = ValidatedPassword::new(&request.new_password)?;

    let (_, user) = verify_reset_token(&request.token, OffsetDateTime::now_utc(), &*state.db()?)?;

    if user.password_hash.matches(&request.new_password)? {
        return Err(Error::SamePassword);
    }

    let password_hash = PasswordHash::new(new_password, state.auth_config.password_hash_cost)?;

    {
        let mut connection = state.db()?;
        let transaction = connection.transaction()?;

        // The token may have been used while the password was hashed.
        let (reset, user) =
            verify_reset_token(&request.token, OffsetDateTime::now_utc(), &transaction)?;
        update_password(user.id, &password_hash, &transaction)?;
        consume_password_reset(reset.id, &transaction)?;
        bump_token_version(user.id, &transaction)?;
        revoke_all_refresh_tokens(user.id, &transaction)?;

        transaction.commit()?;
    }

    tracing::info!("User {} reset their password", user.id);

    state.mailer.send_password_changed(
        &user.email,
        OffsetDateTime::now_utc(),
        &forgot_password_link(&state.auth_config.frontend_url),
    );

    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}
